//! Apply engine - runs reconciled items through their resource
//!
//! Items of one resource are applied sequentially: package manager CLIs and
//! writes into the same home directory are not safe to run concurrently.
//! Independent resources may run in parallel via [`apply_resources`].

use crate::context::Context;
use crate::resource::Resource;
use crate::types::{Item, ItemState, OperationResult, OperationStatus};
use rayon::prelude::*;

/// Options for an apply run
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Don't make changes, report `would-*` statuses instead
    pub dry_run: bool,
    /// Also act on untracked items (resources may refuse)
    pub include_untracked: bool,
    /// Number of resources applied in parallel
    pub jobs: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            include_untracked: false,
            jobs: 4,
        }
    }
}

/// Progress callback for apply runs
pub trait ProgressCallback: Send {
    /// Called before the first item of a resource, with the number to apply
    fn on_start(&mut self, resource: &str, total: usize);

    /// Called before applying an item (`index` is 1-based)
    fn on_item_start(&mut self, index: usize, total: usize, item: &Item);

    /// Called after an item was applied or failed
    fn on_item_complete(&mut self, item: &Item, result: &OperationResult);

    /// Called after the last item of a resource
    fn on_complete(&mut self, resource: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _resource: &str, _total: usize) {}
    fn on_item_start(&mut self, _index: usize, _total: usize, _item: &Item) {}
    fn on_item_complete(&mut self, _item: &Item, _result: &OperationResult) {}
    fn on_complete(&mut self, _resource: &str) {}
}

/// Status an item would get on success, or `None` when nothing is to be done
pub fn planned_status(state: ItemState, opts: &ApplyOptions) -> Option<OperationStatus> {
    let status = match (state, opts.dry_run) {
        (ItemState::Managed, _) => return None,
        (ItemState::Untracked, _) if !opts.include_untracked => return None,
        (ItemState::Missing, false) => OperationStatus::Added,
        (ItemState::Missing, true) => OperationStatus::WouldAdd,
        (ItemState::Degraded, false) => OperationStatus::Updated,
        (ItemState::Degraded, true) => OperationStatus::WouldUpdate,
        (ItemState::Untracked, false) => OperationStatus::Removed,
        (ItemState::Untracked, true) => OperationStatus::WouldRemove,
    };
    Some(status)
}

/// Apply every actionable item of one resource.
///
/// A failing item is recorded and the batch moves on. After cancellation the
/// remaining items are recorded as failed without calling the resource.
pub fn apply_items<P>(
    resource: &dyn Resource,
    ctx: &Context,
    items: &[Item],
    opts: &ApplyOptions,
    progress: &mut P,
) -> Vec<OperationResult>
where
    P: ProgressCallback + ?Sized,
{
    let actionable: Vec<(&Item, OperationStatus)> = items
        .iter()
        .filter_map(|item| planned_status(item.state, opts).map(|status| (item, status)))
        .collect();

    let id = resource.id();
    let total = actionable.len();
    progress.on_start(&id, total);

    let mut results = Vec::with_capacity(total);
    for (index, (item, status)) in actionable.into_iter().enumerate() {
        progress.on_item_start(index + 1, total, item);

        let outcome = if status.is_dry_run() {
            Ok(())
        } else {
            ctx.check().and_then(|()| resource.apply(ctx, item))
        };

        let result = match outcome {
            Ok(()) => OperationResult::new(&item.name, status),
            Err(e) => {
                let message = e.chain();
                log::debug!("{} '{}' failed: {}", item.domain, item.name, message);
                OperationResult::failed(&item.name, message)
            }
        }
        .with_manager(item.manager.clone())
        .with_metadata("domain", &item.domain);

        progress.on_item_complete(item, &result);
        results.push(result);
    }

    progress.on_complete(&id);
    results
}

/// One resource together with its reconciled items and the context its
/// apply runs under
pub struct ResourceBatch<'a> {
    pub resource: &'a dyn Resource,
    pub ctx: Context,
    pub items: Vec<Item>,
}

/// Apply several independent resources in parallel.
///
/// Each batch is applied sequentially with its own progress callback from
/// `progress_for(resource id)`. Returns `(resource id, results)` in the order
/// the batches were given.
pub fn apply_resources<F, P>(
    batches: &[ResourceBatch<'_>],
    opts: &ApplyOptions,
    progress_for: F,
) -> crate::Result<Vec<(String, Vec<OperationResult>)>>
where
    F: Fn(&str) -> P + Sync,
    P: ProgressCallback,
{
    if batches.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.clamp(1, batches.len()))
        .build()
        .map_err(std::io::Error::other)?;

    let results = pool.install(|| {
        batches
            .par_iter()
            .map(|batch| {
                let id = batch.resource.id();
                let mut progress = progress_for(&id);
                let results = apply_items(batch.resource, &batch.ctx, &batch.items, opts, &mut progress);
                (id, results)
            })
            .collect()
    });

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::types::calculate_summary;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingResource {
        id: String,
        desired: Vec<Item>,
        fail: Vec<String>,
        applied: Mutex<Vec<String>>,
    }

    impl Resource for RecordingResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn desired(&self) -> &[Item] {
            &self.desired
        }

        fn set_desired(&mut self, items: Vec<Item>) {
            self.desired = items;
        }

        fn actual(&self, _ctx: &Context) -> Result<Vec<Item>> {
            Ok(Vec::new())
        }

        fn apply(&self, _ctx: &Context, item: &Item) -> Result<()> {
            if self.fail.contains(&item.name) {
                return Err(Error::apply(&item.domain, &item.name, "boom"));
            }
            if item.state == ItemState::Untracked {
                return Err(Error::not_supported(&item.domain, &item.name, "refusing to delete"));
            }
            self.applied.lock().unwrap().push(item.name.clone());
            Ok(())
        }
    }

    fn items() -> Vec<Item> {
        vec![
            Item::new("ok", "test"),
            Item::new("new", "test").with_state(ItemState::Missing),
            Item::new("drifted", "test").with_state(ItemState::Degraded),
            Item::new("stray", "test").with_state(ItemState::Untracked),
        ]
    }

    #[derive(Default)]
    struct CountingProgress {
        started: usize,
        completed: usize,
        totals: Vec<usize>,
    }

    impl ProgressCallback for CountingProgress {
        fn on_start(&mut self, _resource: &str, total: usize) {
            self.totals.push(total);
        }
        fn on_item_start(&mut self, _index: usize, _total: usize, _item: &Item) {
            self.started += 1;
        }
        fn on_item_complete(&mut self, _item: &Item, _result: &OperationResult) {
            self.completed += 1;
        }
        fn on_complete(&mut self, _resource: &str) {}
    }

    #[test]
    fn test_planned_status() {
        let opts = ApplyOptions::default();
        assert_eq!(planned_status(ItemState::Managed, &opts), None);
        assert_eq!(planned_status(ItemState::Untracked, &opts), None);
        assert_eq!(planned_status(ItemState::Missing, &opts), Some(OperationStatus::Added));
        assert_eq!(planned_status(ItemState::Degraded, &opts), Some(OperationStatus::Updated));

        let dry = ApplyOptions {
            dry_run: true,
            include_untracked: true,
            ..ApplyOptions::default()
        };
        assert_eq!(planned_status(ItemState::Missing, &dry), Some(OperationStatus::WouldAdd));
        assert_eq!(planned_status(ItemState::Untracked, &dry), Some(OperationStatus::WouldRemove));
    }

    #[test]
    fn test_apply_skips_managed_and_untracked_by_default() {
        let resource = RecordingResource::default();
        let mut progress = CountingProgress::default();
        let results = apply_items(&resource, &Context::new(), &items(), &ApplyOptions::default(), &mut progress);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, OperationStatus::Added);
        assert_eq!(results[1].status, OperationStatus::Updated);
        assert_eq!(*resource.applied.lock().unwrap(), ["new", "drifted"]);
        assert_eq!(progress.totals, [2]);
        assert_eq!(progress.started, 2);
        assert_eq!(progress.completed, 2);
    }

    #[test]
    fn test_dry_run_does_not_call_resource() {
        let resource = RecordingResource::default();
        let opts = ApplyOptions {
            dry_run: true,
            ..ApplyOptions::default()
        };
        let results = apply_items(&resource, &Context::new(), &items(), &opts, &mut NoProgress);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, OperationStatus::WouldAdd);
        assert_eq!(results[1].status, OperationStatus::WouldUpdate);
        assert!(resource.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let resource = RecordingResource {
            fail: vec!["new".into()],
            ..RecordingResource::default()
        };
        let results = apply_items(&resource, &Context::new(), &items(), &ApplyOptions::default(), &mut NoProgress);

        assert_eq!(results[0].status, OperationStatus::Failed);
        assert!(results[0].error.as_deref().unwrap().contains("new"));
        assert_eq!(results[1].status, OperationStatus::Updated);

        let summary = calculate_summary(&results);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 1);
    }

    #[test]
    fn test_untracked_refusal_is_recorded() {
        let resource = RecordingResource::default();
        let opts = ApplyOptions {
            include_untracked: true,
            ..ApplyOptions::default()
        };
        let results = apply_items(&resource, &Context::new(), &items(), &opts, &mut NoProgress);

        let stray = results.iter().find(|r| r.name == "stray").unwrap();
        assert_eq!(stray.status, OperationStatus::Failed);
        assert!(stray.error.as_deref().unwrap().contains("not supported"));
    }

    #[test]
    fn test_cancelled_context_fails_remaining_items() {
        let resource = RecordingResource::default();
        let ctx = Context::new();
        ctx.cancel();
        let results = apply_items(&resource, &ctx, &items(), &ApplyOptions::default(), &mut NoProgress);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(OperationResult::is_failed));
        assert!(resource.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_results_carry_manager_and_domain() {
        let resource = RecordingResource::default();
        let items = vec![Item::new("jq", "package")
            .with_manager("brew")
            .with_state(ItemState::Missing)];
        let results = apply_items(&resource, &Context::new(), &items, &ApplyOptions::default(), &mut NoProgress);
        assert_eq!(results[0].manager.as_deref(), Some("brew"));
        assert_eq!(results[0].metadata["domain"], "package");
    }

    #[test]
    fn test_apply_resources_in_parallel() {
        let first = RecordingResource {
            id: "first".into(),
            ..RecordingResource::default()
        };
        let second = RecordingResource {
            id: "second".into(),
            ..RecordingResource::default()
        };
        let batches = vec![
            ResourceBatch {
                resource: &first,
                ctx: Context::new(),
                items: items(),
            },
            ResourceBatch {
                resource: &second,
                ctx: Context::new(),
                items: vec![Item::new("only", "test").with_state(ItemState::Missing)],
            },
        ];

        let results = apply_resources(&batches, &ApplyOptions::default(), |_| NoProgress).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "first");
        assert_eq!(results[0].1.len(), 2);
        assert_eq!(results[1].0, "second");
        assert_eq!(results[1].1[0].status, OperationStatus::Added);
    }

    #[test]
    fn test_apply_resources_uses_each_batch_context() {
        let first = RecordingResource {
            id: "first".into(),
            ..RecordingResource::default()
        };
        let second = RecordingResource {
            id: "second".into(),
            ..RecordingResource::default()
        };
        let cancelled = Context::new();
        cancelled.cancel();
        let batches = vec![
            ResourceBatch {
                resource: &first,
                ctx: Context::new(),
                items: vec![Item::new("a", "test").with_state(ItemState::Missing)],
            },
            ResourceBatch {
                resource: &second,
                ctx: cancelled,
                items: vec![Item::new("b", "test").with_state(ItemState::Missing)],
            },
        ];

        let started = Mutex::new(Vec::new());
        let results = apply_resources(&batches, &ApplyOptions::default(), |id| {
            started.lock().unwrap().push(id.to_string());
            NoProgress
        })
        .unwrap();

        assert_eq!(results[0].1[0].status, OperationStatus::Added);
        assert_eq!(results[1].1[0].status, OperationStatus::Failed);
        assert_eq!(first.applied.lock().unwrap().as_slice(), ["a"]);
        assert!(second.applied.lock().unwrap().is_empty());

        let mut started = started.into_inner().unwrap();
        started.sort();
        assert_eq!(started, ["first", "second"]);
    }

    #[test]
    fn test_apply_resources_empty() {
        let results = apply_resources(&[], &ApplyOptions::default(), |_| NoProgress).unwrap();
        assert!(results.is_empty());
    }
}
