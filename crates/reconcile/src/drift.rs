//! Drift detection hooks
//!
//! An item may carry a comparator in its metadata. When the reconciler finds
//! the item in both desired and actual state it asks the comparator whether
//! the deployed content still matches the source of truth.

use crate::error::Result;
use crate::metadata::{MetaValue, keys};
use crate::types::Item;
use std::fmt;
use std::sync::Arc;

/// Compares an item's deployed content against its source of truth
pub trait DriftComparator: Send + Sync {
    /// `Ok(true)` when content matches, `Ok(false)` when it drifted, and an
    /// error when the comparison itself could not run.
    fn compare(&self) -> Result<bool>;

    /// Short label used in debug output
    fn describe(&self) -> String {
        "drift comparator".to_string()
    }
}

/// Adapter that turns a closure into a [`DriftComparator`]
///
/// Used for the legacy `compare_fn` metadata key.
pub struct FnComparator<F> {
    compare: F,
}

impl<F> FnComparator<F>
where
    F: Fn() -> Result<bool> + Send + Sync,
{
    pub fn new(compare: F) -> Self {
        Self { compare }
    }
}

impl<F> DriftComparator for FnComparator<F>
where
    F: Fn() -> Result<bool> + Send + Sync,
{
    fn compare(&self) -> Result<bool> {
        (self.compare)()
    }

    fn describe(&self) -> String {
        "compare_fn".to_string()
    }
}

impl fmt::Debug for dyn DriftComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DriftComparator({})", self.describe())
    }
}

/// Get the drift comparator attached to an item, if any.
///
/// The typed `drift_comparator` key wins over the legacy `compare_fn` key.
pub fn get_drift_comparator(item: &Item) -> Option<Arc<dyn DriftComparator>> {
    [keys::DRIFT_COMPARATOR, keys::COMPARE_FN]
        .into_iter()
        .find_map(|key| match item.metadata.get(key) {
            Some(MetaValue::Comparator(comparator)) => Some(Arc::clone(comparator)),
            _ => None,
        })
}
