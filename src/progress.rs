//! Progress bar for apply batches

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reconcile::{Item, OperationResult, ProgressCallback};

use crate::ui;

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} {spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Bars of resources applied side by side, drawn together
#[derive(Clone)]
pub struct ProgressGroup {
    enabled: bool,
    multi: MultiProgress,
}

impl ProgressGroup {
    /// A disabled group never draws (quiet or structured output)
    pub fn new(enabled: bool) -> Self {
        let target = if cfg!(test) {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        Self {
            enabled,
            multi: MultiProgress::with_draw_target(target),
        }
    }

    /// Callback for one resource, its bar drawn in this group
    pub fn progress(&self) -> ApplyProgress {
        ApplyProgress {
            enabled: self.enabled,
            multi: self.multi.clone(),
            bar: None,
        }
    }
}

/// One bar per resource, cleared when the resource finishes.
///
/// Failures are printed above the bars as they happen.
pub struct ApplyProgress {
    enabled: bool,
    multi: MultiProgress,
    bar: Option<ProgressBar>,
}

impl ProgressCallback for ApplyProgress {
    fn on_start(&mut self, resource: &str, total: usize) {
        if !self.enabled || total == 0 {
            return;
        }
        let bar = self.multi.add(ProgressBar::new(total as u64));
        bar.set_style(bar_style());
        bar.set_prefix(resource.to_string());
        self.bar = Some(bar);
    }

    fn on_item_start(&mut self, _index: usize, _total: usize, item: &Item) {
        if let Some(bar) = &self.bar {
            bar.set_message(item.name.clone());
        }
    }

    fn on_item_complete(&mut self, item: &Item, result: &OperationResult) {
        let Some(bar) = &self.bar else {
            return;
        };
        if let Some(error) = result.error.as_deref().filter(|_| result.is_failed()) {
            self.multi
                .suspend(|| ui::error(&format!("{}: {}", item.name, error)));
        }
        bar.inc(1);
    }

    fn on_complete(&mut self, _resource: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }
}
