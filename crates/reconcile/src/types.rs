//! Core types for reconciliation

use crate::error::{Error, Result};
use crate::metadata::{Metadata, StringMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Domain of package items
pub const DOMAIN_PACKAGE: &str = "package";

/// Domain of dotfile items
pub const DOMAIN_DOTFILE: &str = "dotfile";

/// Fallback domain for items that arrive without one
pub const DOMAIN_UNKNOWN: &str = "unknown";

/// Reconciliation state of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Desired and present
    #[default]
    Managed,
    /// Desired but not present
    Missing,
    /// Present but not desired
    Untracked,
    /// Desired and present, but content drifted from the source
    Degraded,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Missing => "missing",
            Self::Untracked => "untracked",
            Self::Degraded => "degraded",
        }
    }

    /// Whether `apply` would change something for an item in this state
    pub fn needs_action(&self) -> bool {
        !matches!(self, Self::Managed)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed entity: a package or a dotfile
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Item {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    pub state: ItemState,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: StringMap,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Item {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: ItemState) -> Self {
        self.state = state;
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn with_manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = Some(manager.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Manager name, or an empty string for manager-less items
    pub fn manager_str(&self) -> &str {
        self.manager.as_deref().unwrap_or_default()
    }
}

// ============================================================================
// Per-domain results
// ============================================================================

/// Reconciliation output for one domain (and optionally one manager)
#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainResult {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    pub managed: Vec<Item>,
    pub missing: Vec<Item>,
    pub untracked: Vec<Item>,
}

impl DomainResult {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Build a result by grouping reconciled items.
    ///
    /// Degraded items are counted as managed.
    pub fn from_items(domain: impl Into<String>, manager: Option<String>, items: Vec<Item>) -> Self {
        let grouped = crate::reconcile::group_items_by_state(items);
        Self {
            domain: domain.into(),
            manager,
            managed: grouped.managed,
            missing: grouped.missing,
            untracked: grouped.untracked,
        }
    }

    /// Total number of items across all states
    pub fn count(&self) -> usize {
        self.managed.len() + self.missing.len() + self.untracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Number of managed items whose content drifted
    pub fn degraded_count(&self) -> usize {
        self.managed
            .iter()
            .filter(|i| i.state == ItemState::Degraded)
            .count()
    }

    /// Fold this result into a summary
    pub fn add_to_summary(&self, summary: &mut Summary) {
        summary.total_managed += self.managed.len();
        summary.total_missing += self.missing.len();
        summary.total_untracked += self.untracked.len();
        summary.results.push(self.clone());
    }
}

/// Aggregate across domains
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub total_managed: usize,
    pub total_missing: usize,
    pub total_untracked: usize,
    pub results: Vec<DomainResult>,
}

impl Summary {
    /// Total items across every folded result
    pub fn total(&self) -> usize {
        self.total_managed + self.total_missing + self.total_untracked
    }
}

/// Build a summary from per-domain results, in domain order
pub fn convert_results_to_summary(results: &BTreeMap<String, DomainResult>) -> Summary {
    let mut summary = Summary::default();
    for result in results.values() {
        result.add_to_summary(&mut summary);
    }
    summary
}

// ============================================================================
// Operation results
// ============================================================================

/// Outcome status of one mutating action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Added,
    Updated,
    Removed,
    Unlinked,
    Skipped,
    Failed,
    AlreadyManaged,
    AlreadyInstalled,
    WouldAdd,
    WouldUpdate,
    WouldRemove,
    WouldUnlink,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::Unlinked => "unlinked",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::AlreadyManaged => "already-managed",
            Self::AlreadyInstalled => "already-installed",
            Self::WouldAdd => "would-add",
            Self::WouldUpdate => "would-update",
            Self::WouldRemove => "would-remove",
            Self::WouldUnlink => "would-unlink",
        }
    }

    /// Whether this is a dry-run status
    pub fn is_dry_run(&self) -> bool {
        matches!(
            self,
            Self::WouldAdd | Self::WouldUpdate | Self::WouldRemove | Self::WouldUnlink
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one mutating action (install, add-dotfile, remove-dotfile)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_managed: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub files_processed: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: StringMap,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl OperationResult {
    pub fn new(name: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            name: name.into(),
            manager: None,
            version: None,
            status,
            error: None,
            already_managed: false,
            files_processed: 0,
            metadata: StringMap::new(),
        }
    }

    /// A failed result carrying the error message
    pub fn failed(name: impl Into<String>, error: impl fmt::Display) -> Self {
        let mut result = Self::new(name, OperationStatus::Failed);
        result.error = Some(error.to_string());
        result
    }

    pub fn with_manager(mut self, manager: Option<String>) -> Self {
        self.manager = manager;
        self
    }

    pub fn with_files_processed(mut self, count: usize) -> Self {
        self.files_processed = count;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == OperationStatus::Failed
    }
}

/// Counts over a batch of operation results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unlinked: usize,
    pub skipped: usize,
    pub failed: usize,
    pub files_processed: usize,
}

impl ResultSummary {
    /// Number of changes made (or that would be made)
    pub fn total_changes(&self) -> usize {
        self.added + self.updated + self.removed + self.unlinked
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Summarize a batch; dry-run statuses count with their real counterparts
pub fn calculate_summary(results: &[OperationResult]) -> ResultSummary {
    let mut summary = ResultSummary {
        total: results.len(),
        ..ResultSummary::default()
    };

    for result in results {
        match result.status {
            OperationStatus::Added | OperationStatus::WouldAdd => summary.added += 1,
            OperationStatus::Updated | OperationStatus::WouldUpdate => summary.updated += 1,
            OperationStatus::Removed | OperationStatus::WouldRemove => summary.removed += 1,
            OperationStatus::Unlinked | OperationStatus::WouldUnlink => summary.unlinked += 1,
            OperationStatus::Skipped => summary.skipped += 1,
            OperationStatus::Failed => summary.failed += 1,
            OperationStatus::AlreadyManaged | OperationStatus::AlreadyInstalled => {}
        }
        summary.files_processed += result.files_processed;
    }

    summary
}

/// Count results with a specific status
pub fn count_by_status(results: &[OperationResult], status: OperationStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

/// Error when a non-empty batch failed completely
pub fn validate_operation_results(results: &[OperationResult], operation: &str) -> Result<()> {
    if results.is_empty() || !results.iter().all(OperationResult::is_failed) {
        return Ok(());
    }
    Err(Error::AllFailed {
        operation: operation.to_string(),
        count: results.len(),
    })
}
