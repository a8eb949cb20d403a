//! # Reconcile
//!
//! State reconciliation for personal-environment management.
//!
//! A domain (packages, dotfiles, ...) plugs in by implementing [`Resource`]:
//! it supplies the desired item set, scans the actual one, and applies the
//! transition implied by each reconciled item's state.
//!
//! ## Core Concepts
//!
//! - **Item**: one managed entity, tagged with an [`ItemState`]
//! - **Reconciler**: classifies items by key as managed, missing or untracked
//! - **DriftComparator**: optional per-item hook that downgrades a managed
//!   item to degraded when its content drifted
//! - **Executor**: applies reconciled items and records [`OperationResult`]s
//!
//! ## Example
//!
//! ```
//! use reconcile::{Item, ItemState, reconcile_items};
//!
//! let desired = vec![Item::new("ripgrep", "package"), Item::new("jq", "package")];
//! let actual = vec![Item::new("jq", "package"), Item::new("htop", "package")];
//!
//! let items = reconcile_items(&desired, &actual);
//! let state = |name: &str| items.iter().find(|i| i.name == name).unwrap().state;
//!
//! assert_eq!(state("ripgrep"), ItemState::Missing);
//! assert_eq!(state("jq"), ItemState::Managed);
//! assert_eq!(state("htop"), ItemState::Untracked);
//! ```

pub mod context;
pub mod drift;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod reconcile;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::Context;
pub use drift::{DriftComparator, FnComparator, get_drift_comparator};
pub use error::{BoxError, Error, Result};
pub use executor::{
    ApplyOptions, NoProgress, ProgressCallback, ResourceBatch, apply_items, apply_resources,
    planned_status,
};
pub use metadata::{
    MetaValue, Metadata, StringMap, deep_copy_metadata, deep_copy_string_map, keys,
    merge_metadata, merge_string_map,
};
pub use reconcile::{
    GroupedItems, group_items_by_state, manager_name_key, name_key, reconcile_items,
    reconcile_items_with_key, reconcile_resource, reconcile_resource_with_key,
};
pub use resource::{BoxedResource, Resource};
pub use types::{
    DOMAIN_DOTFILE, DOMAIN_PACKAGE, DOMAIN_UNKNOWN, DomainResult, Item, ItemState,
    OperationResult, OperationStatus, ResultSummary, Summary, calculate_summary,
    convert_results_to_summary, count_by_status, validate_operation_results,
};
