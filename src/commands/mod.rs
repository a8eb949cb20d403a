//! Command implementations
//!
//! Each command loads the resources it needs from the config directory,
//! runs against a context bounded by `operation_timeout`, and reports either
//! colored lines or a JSON/YAML document.

pub mod apply;
pub mod diff;
pub mod dot;
pub mod info;
pub mod install;
pub mod search;
pub mod status;
pub mod uninstall;

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use pkgkit::{AvailabilityCache, Registry};
use reconcile::{
    DOMAIN_DOTFILE, DOMAIN_PACKAGE, DomainResult, Item, OperationResult, ResultSummary, calculate_summary,
    manager_name_key, reconcile_items_with_key, reconcile_resource, validate_operation_results,
};

use crate::Context as AppContext;
use crate::dotfiles::DotfileResource;
use crate::output;
use crate::packages::PackageResource;
use crate::ui;

pub(crate) fn load_dotfiles(app: &AppContext) -> Result<DotfileResource> {
    DotfileResource::load(&app.config_dir, &app.home, &app.config).context("Failed to load dotfiles")
}

pub(crate) fn load_packages(app: &AppContext) -> Result<PackageResource> {
    load_packages_for(app, None)
}

/// [`load_packages`] wired to `only` manager when given
pub(crate) fn load_packages_for(app: &AppContext, only: Option<&str>) -> Result<PackageResource> {
    PackageResource::load(
        &app.config_dir,
        &Registry::new(),
        Arc::new(AvailabilityCache::default()),
        &app.config,
        only,
    )
    .context("Failed to load packages")
}

/// Domains that could not be reconciled, keyed like their results
/// (`package:<manager>`, `dotfile`), with the error chain
pub(crate) type DomainErrors = BTreeMap<String, String>;

/// Reconciled items of every requested domain.
///
/// A domain whose scan fails is recorded in `errors` and left out; the
/// other domains are still reconciled.
#[derive(Debug, Default)]
pub(crate) struct Reconciled {
    /// Package items per manager, managers without any item omitted
    pub packages: BTreeMap<String, Vec<Item>>,
    pub dotfiles: Option<Vec<Item>>,
    pub errors: DomainErrors,
}

impl Reconciled {
    /// One result per package manager plus one for dotfiles
    pub fn domain_results(&self) -> BTreeMap<String, DomainResult> {
        let mut results = BTreeMap::new();
        for (manager, items) in &self.packages {
            results.insert(
                format!("{DOMAIN_PACKAGE}:{manager}"),
                DomainResult::from_items(DOMAIN_PACKAGE, Some(manager.clone()), items.clone()),
            );
        }
        if let Some(items) = &self.dotfiles {
            results.insert(
                DOMAIN_DOTFILE.to_string(),
                DomainResult::from_items(DOMAIN_DOTFILE, None, items.clone()),
            );
        }
        results
    }

    /// Every package item, managers in name order
    pub fn package_items(&self) -> Vec<Item> {
        self.packages.values().flatten().cloned().collect()
    }
}

/// Reconcile the given resources, each package manager and the dotfiles
/// as separate domains
pub(crate) fn reconcile_domains(
    app: &AppContext,
    ctx: &reconcile::Context,
    packages: Option<&PackageResource>,
    dotfiles: Option<&DotfileResource>,
) -> Reconciled {
    let mut reconciled = Reconciled::default();

    if let Some(packages) = packages {
        match packages.scan_by_manager(ctx) {
            Ok(scans) => {
                for (manager, scan) in scans {
                    match scan {
                        Ok(actual) => {
                            let desired = packages.desired_for(&manager);
                            let items = reconcile_items_with_key(&desired, &actual, manager_name_key);
                            if !items.is_empty() {
                                reconciled.packages.insert(manager, items);
                            }
                        }
                        Err(e) => {
                            log::warn!("Could not reconcile {manager} packages: {}", e.chain());
                            reconciled
                                .errors
                                .insert(format!("{DOMAIN_PACKAGE}:{manager}"), e.chain());
                        }
                    }
                }
            }
            Err(e) => {
                reconciled.errors.insert(DOMAIN_PACKAGE.to_string(), e.chain());
            }
        }
    }

    if let Some(dotfiles) = dotfiles {
        let scoped = ctx.with_timeout(app.config.dotfile_timeout());
        match reconcile_resource(&scoped, dotfiles) {
            Ok(items) => reconciled.dotfiles = Some(items),
            Err(e) => {
                log::warn!("Could not reconcile dotfiles: {}", e.chain());
                reconciled.errors.insert(DOMAIN_DOTFILE.to_string(), e.chain());
            }
        }
    }

    reconciled
}

/// Document printed by mutating commands in JSON/YAML mode
#[derive(Debug, Serialize)]
struct Report<'a> {
    operation: &'a str,
    dry_run: bool,
    summary: ResultSummary,
    results: &'a [OperationResult],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: &'a DomainErrors,
}

/// Print the results of a mutating command and turn failures into an error
pub(crate) fn report(app: &AppContext, operation: &str, dry_run: bool, results: &[OperationResult]) -> Result<()> {
    report_with_errors(app, operation, dry_run, results, &DomainErrors::new())
}

/// [`report`] for commands that also reconcile, listing the domains that
/// could not be reconciled
pub(crate) fn report_with_errors(
    app: &AppContext,
    operation: &str,
    dry_run: bool,
    results: &[OperationResult],
    errors: &DomainErrors,
) -> Result<()> {
    let summary = calculate_summary(results);

    if app.output.is_structured() {
        output::print(
            app.output,
            &Report {
                operation,
                dry_run,
                summary: summary.clone(),
                results,
                errors,
            },
        )?;
    } else {
        print_domain_errors(errors);
        print_results(app, results, &summary, dry_run);
    }

    finish(operation, &summary, results, errors)
}

pub(crate) fn print_domain_errors(errors: &DomainErrors) {
    for (domain, error) in errors {
        ui::error(&format!("{domain}: {error}"));
    }
}

fn print_results(app: &AppContext, results: &[OperationResult], summary: &ResultSummary, dry_run: bool) {
    for result in results {
        if app.quiet && !result.is_failed() {
            continue;
        }
        let manager = result
            .manager
            .as_deref()
            .map(|m| format!(" ({m})").dimmed().to_string())
            .unwrap_or_default();
        println!(
            "  {} {}{} {}",
            ui::status_glyph(result.status),
            result.name,
            manager,
            ui::status_label(result.status)
        );
        if let Some(error) = &result.error {
            ui::dim(error);
        }
    }

    if app.quiet {
        return;
    }
    println!();
    let line = summary_line(summary, dry_run);
    if summary.failed > 0 {
        ui::warn(&line);
    } else {
        ui::success(&line);
    }
}

/// `2 added, 1 failed` style totals
pub(crate) fn summary_line(summary: &ResultSummary, dry_run: bool) -> String {
    let counts = [
        (summary.added, if dry_run { "to add" } else { "added" }),
        (summary.updated, if dry_run { "to update" } else { "updated" }),
        (summary.removed, if dry_run { "to remove" } else { "removed" }),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
    ];
    let parts: Vec<String> = counts
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect();

    if parts.is_empty() {
        "Nothing to do".to_string()
    } else if dry_run {
        format!("Dry run: {}", parts.join(", "))
    } else {
        parts.join(", ")
    }
}

/// Error when any result failed or any domain could not be reconciled, so
/// the process exits non-zero
pub(crate) fn finish(
    operation: &str,
    summary: &ResultSummary,
    results: &[OperationResult],
    errors: &DomainErrors,
) -> Result<()> {
    validate_operation_results(results, operation)?;
    if summary.failed > 0 {
        bail!(
            "{operation}: {} of {} item(s) failed",
            summary.failed,
            summary.total
        );
    }
    domains_failed(operation, errors)
}

/// Error naming the domains that could not be reconciled
pub(crate) fn domains_failed(operation: &str, errors: &DomainErrors) -> Result<()> {
    if !errors.is_empty() {
        let domains: Vec<&str> = errors.keys().map(String::as_str).collect();
        bail!("{operation}: could not reconcile {}", domains.join(", "));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::Sandbox;
    use super::*;
    use crate::lock::Lock;
    use crate::packages::testing::FakeManager;
    use pkgkit::PackageManager;
    use reconcile::{ItemState, OperationStatus};
    use std::time::Duration;

    fn summary_of(statuses: &[OperationStatus]) -> (ResultSummary, Vec<OperationResult>) {
        let results: Vec<_> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| OperationResult::new(format!("item{i}"), *s))
            .collect();
        (calculate_summary(&results), results)
    }

    #[test]
    fn test_summary_line() {
        let (summary, _) = summary_of(&[OperationStatus::Added, OperationStatus::Added, OperationStatus::Failed]);
        assert_eq!(summary_line(&summary, false), "2 added, 1 failed");

        let (summary, _) = summary_of(&[OperationStatus::WouldRemove]);
        assert_eq!(summary_line(&summary, true), "Dry run: 1 to remove");

        let (summary, _) = summary_of(&[OperationStatus::AlreadyManaged]);
        assert_eq!(summary_line(&summary, false), "Nothing to do");
    }

    #[test]
    fn test_finish_fails_on_partial_failure() {
        let (summary, results) = summary_of(&[OperationStatus::Added, OperationStatus::Failed]);
        let err = finish("install", &summary, &results, &DomainErrors::new()).unwrap_err();
        assert_eq!(err.to_string(), "install: 1 of 2 item(s) failed");
    }

    #[test]
    fn test_finish_all_failed() {
        let (summary, results) = summary_of(&[OperationStatus::Failed, OperationStatus::Failed]);
        let err = finish("install", &summary, &results, &DomainErrors::new()).unwrap_err();
        assert!(err.to_string().contains("all 2 item(s) failed to process"));
    }

    #[test]
    fn test_finish_ok() {
        let (summary, results) = summary_of(&[OperationStatus::Added, OperationStatus::Skipped]);
        assert!(finish("dot add", &summary, &results, &DomainErrors::new()).is_ok());
        let (summary, results) = summary_of(&[]);
        assert!(finish("apply", &summary, &results, &DomainErrors::new()).is_ok());
    }

    #[test]
    fn test_finish_reports_unreconciled_domains() {
        let (summary, results) = summary_of(&[OperationStatus::Added]);
        let mut errors = DomainErrors::new();
        errors.insert("package:npm".to_string(), "failed to scan packages (npm)".to_string());
        let err = finish("apply", &summary, &results, &errors).unwrap_err();
        assert_eq!(err.to_string(), "apply: could not reconcile package:npm");
    }

    #[test]
    fn test_failing_manager_does_not_hide_other_domains() {
        let sandbox = Sandbox::new();
        let app = sandbox.app();
        sandbox.write(&sandbox.config_dir(), "zshrc", "export A=1\n");

        let mut lock = Lock::default();
        lock.add_package("brew", "jq");
        lock.add_package("npm", "typescript");
        let brew: Arc<dyn PackageManager> = Arc::new(FakeManager::new("brew").with_installed(&["jq"]));
        let npm: Arc<dyn PackageManager> = Arc::new(FakeManager::new("npm").failing_list());
        let packages = PackageResource::new(
            &sandbox.config_dir(),
            lock,
            vec![brew, npm],
            Arc::new(AvailabilityCache::default()),
            Duration::from_secs(5),
        );
        let dotfiles = load_dotfiles(&app).unwrap();

        let reconciled = reconcile_domains(&app, &reconcile::Context::new(), Some(&packages), Some(&dotfiles));

        let failed: Vec<_> = reconciled.errors.keys().cloned().collect();
        assert_eq!(failed, ["package:npm"]);
        assert_eq!(reconciled.errors["package:npm"].matches("list failed").count(), 1);

        let results = reconciled.domain_results();
        let keys: Vec<_> = results.keys().cloned().collect();
        assert_eq!(keys, ["dotfile", "package:brew"]);
        assert_eq!(results["package:brew"].managed.len(), 1);
        assert_eq!(results["dotfile"].missing[0].name, ".zshrc");
        assert_eq!(reconciled.package_items()[0].state, ItemState::Managed);
    }

    #[test]
    fn test_cancelled_context_fails_each_domain() {
        let sandbox = Sandbox::new();
        let app = sandbox.app();
        let dotfiles = load_dotfiles(&app).unwrap();
        let ctx = reconcile::Context::new();
        ctx.cancel();

        let reconciled = reconcile_domains(&app, &ctx, None, Some(&dotfiles));
        assert!(reconciled.dotfiles.is_none());
        assert!(reconciled.errors[DOMAIN_DOTFILE].contains("cancelled"));
    }
}
