//! Desired vs actual reconciliation
//!
//! Classifies every key across the two item sets:
//!
//! | desired | actual | state |
//! |---------|--------|-------|
//! | yes | yes | `Managed` (or `Degraded` when a drift comparator reports drift) |
//! | yes | no  | `Missing` |
//! | no  | yes | `Untracked` |
//!
//! Keys are compared exactly: `"Item1"` and `"item1"` never match, even on a
//! case-insensitive filesystem.

use crate::context::Context;
use crate::drift::get_drift_comparator;
use crate::error::Result;
use crate::metadata::{deep_copy_metadata, deep_copy_string_map, keys, merge_metadata, merge_string_map};
use crate::resource::Resource;
use crate::types::{DOMAIN_UNKNOWN, Item, ItemState};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Default key: the item name
pub fn name_key(item: &Item) -> String {
    item.name.clone()
}

/// Key for domains where a name alone is ambiguous: `manager:name`
pub fn manager_name_key(item: &Item) -> String {
    format!("{}:{}", item.manager_str(), item.name)
}

/// Reconcile keyed by [`name_key`]
pub fn reconcile_items(desired: &[Item], actual: &[Item]) -> Vec<Item> {
    reconcile_items_with_key(desired, actual, name_key)
}

/// Reconcile with a caller-supplied key function.
///
/// - Duplicate actual keys: the last item wins the lookup.
/// - Duplicate desired keys: every entry is emitted on its own.
/// - Output holds desired items first (input order), then untracked items in
///   first-seen order. Callers that need another order sort downstream.
pub fn reconcile_items_with_key<F>(desired: &[Item], actual: &[Item], key_fn: F) -> Vec<Item>
where
    F: Fn(&Item) -> String,
{
    let mut actual_map: HashMap<String, &Item> = HashMap::with_capacity(actual.len());
    let mut actual_order = Vec::with_capacity(actual.len());
    for item in actual {
        let key = key_fn(item);
        if actual_map.insert(key.clone(), item).is_none() {
            actual_order.push(key);
        }
    }

    let mut consumed = HashSet::with_capacity(desired.len());
    let mut reconciled = Vec::with_capacity(desired.len() + actual_map.len());

    for want in desired {
        let key = key_fn(want);
        match actual_map.get(&key) {
            Some(have) => {
                reconciled.push(merge_managed(want, have));
                consumed.insert(key);
            }
            None => reconciled.push(with_state(want, ItemState::Missing)),
        }
    }

    for key in actual_order {
        if consumed.contains(&key) {
            continue;
        }
        if let Some(have) = actual_map.get(&key) {
            reconciled.push(with_state(have, ItemState::Untracked));
        }
    }

    reconciled
}

/// Copy an item unchanged apart from its state
fn with_state(item: &Item, state: ItemState) -> Item {
    Item {
        name: item.name.clone(),
        item_type: item.item_type.clone(),
        state,
        domain: domain_of(&item.domain, None),
        manager: item.manager.clone(),
        path: item.path.clone(),
        meta: deep_copy_string_map(&item.meta),
        metadata: deep_copy_metadata(&item.metadata),
    }
}

/// Build the output for a key present on both sides.
///
/// Starts from the desired item; unset scalar fields are filled from the
/// actual item and maps are merged with desired entries winning.
fn merge_managed(desired: &Item, actual: &Item) -> Item {
    let mut item = Item {
        name: desired.name.clone(),
        item_type: first_set(&desired.item_type, &actual.item_type),
        state: ItemState::Managed,
        domain: domain_of(&desired.domain, Some(&actual.domain)),
        manager: first_set(&desired.manager, &actual.manager),
        path: first_path(&desired.path, &actual.path),
        meta: merge_string_map(&desired.meta, &actual.meta),
        metadata: merge_metadata(&desired.metadata, &actual.metadata),
    };
    check_drift(&mut item);
    item
}

/// Downgrade to `Degraded` when the item's comparator reports drift.
///
/// A comparator failure leaves the item `Managed`: claiming drift without
/// evidence could trigger a destructive restore.
fn check_drift(item: &mut Item) {
    let Some(comparator) = get_drift_comparator(item) else {
        return;
    };

    match comparator.compare() {
        Ok(true) => {}
        Ok(false) => {
            item.state = ItemState::Degraded;
            item.meta
                .insert(keys::DRIFT_STATUS.to_string(), keys::DRIFT_MODIFIED.to_string());
        }
        Err(e) => {
            let message = e.chain();
            log::warn!(
                "Drift check failed for {} '{}': {}",
                item.domain,
                item.name,
                message
            );
            item.meta.insert(keys::DRIFT_ERROR.to_string(), message);
        }
    }
}

fn first_set(preferred: &Option<String>, fallback: &Option<String>) -> Option<String> {
    preferred
        .as_ref()
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.as_ref().filter(|s| !s.is_empty()))
        .cloned()
}

fn first_path(preferred: &Option<PathBuf>, fallback: &Option<PathBuf>) -> Option<PathBuf> {
    preferred
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| fallback.as_ref().filter(|p| !p.as_os_str().is_empty()))
        .cloned()
}

fn domain_of(preferred: &str, fallback: Option<&str>) -> String {
    [Some(preferred), fallback]
        .into_iter()
        .flatten()
        .find(|d| !d.is_empty())
        .unwrap_or(DOMAIN_UNKNOWN)
        .to_string()
}

// ============================================================================
// Grouping
// ============================================================================

/// Items split by state
#[derive(Debug, Clone, Default)]
pub struct GroupedItems {
    /// Managed and degraded items
    pub managed: Vec<Item>,
    pub missing: Vec<Item>,
    pub untracked: Vec<Item>,
}

impl GroupedItems {
    pub fn len(&self) -> usize {
        self.managed.len() + self.missing.len() + self.untracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split items by state, preserving order within each group.
///
/// Degraded items land in `managed` so no item is dropped.
pub fn group_items_by_state(items: Vec<Item>) -> GroupedItems {
    let mut grouped = GroupedItems::default();
    for item in items {
        match item.state {
            ItemState::Managed | ItemState::Degraded => grouped.managed.push(item),
            ItemState::Missing => grouped.missing.push(item),
            ItemState::Untracked => grouped.untracked.push(item),
        }
    }
    grouped
}

// ============================================================================
// Resource reconciliation
// ============================================================================

/// Reconcile a resource's desired items against a fresh scan, keyed by name
pub fn reconcile_resource(ctx: &Context, resource: &dyn Resource) -> Result<Vec<Item>> {
    reconcile_resource_with_key(ctx, resource, name_key)
}

/// Reconcile a resource with a caller-supplied key function.
///
/// Cancellation before or during the scan is returned as an error, never as
/// an empty actual set.
pub fn reconcile_resource_with_key<F>(ctx: &Context, resource: &dyn Resource, key_fn: F) -> Result<Vec<Item>>
where
    F: Fn(&Item) -> String,
{
    ctx.check()?;
    let actual = resource.actual(ctx)?;
    ctx.check()?;

    log::debug!(
        "Reconciling {}: {} desired, {} actual",
        resource.id(),
        resource.desired().len(),
        actual.len()
    );

    Ok(reconcile_items_with_key(resource.desired(), &actual, key_fn))
}
