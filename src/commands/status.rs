//! `hearth status`: reconcile without applying

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use reconcile::{DomainResult, Item, Summary, convert_results_to_summary, keys};

use super::{DomainErrors, domains_failed, load_dotfiles, load_packages, print_domain_errors, reconcile_domains};
use crate::Context as AppContext;
use crate::cli::StatusArgs;
use crate::output::{self, Table};
use crate::ui;

/// Document printed in JSON/YAML mode
#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    #[serde(flatten)]
    summary: Summary,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: &'a DomainErrors,
}

pub fn run(app: &AppContext, args: &StatusArgs) -> Result<()> {
    let ctx = app.operation();
    let packages = if args.domains.includes_packages() {
        Some(load_packages(app)?)
    } else {
        None
    };
    let dotfiles = if args.domains.includes_dotfiles() {
        Some(load_dotfiles(app)?)
    } else {
        None
    };

    let reconciled = reconcile_domains(app, &ctx, packages.as_ref(), dotfiles.as_ref());
    let results = reconciled.domain_results();

    if app.output.is_structured() {
        let summary = structured_summary(results, args.unmanaged);
        output::print(
            app.output,
            &StatusReport {
                summary,
                errors: &reconciled.errors,
            },
        )?;
    } else {
        display(app, &convert_results_to_summary(&results), args.unmanaged);
        print_domain_errors(&reconciled.errors);
    }

    domains_failed("status", &reconciled.errors)
}

/// Summary for JSON/YAML; untracked items are dropped from both the lists
/// and the totals unless asked for
fn structured_summary(mut results: BTreeMap<String, DomainResult>, show_untracked: bool) -> Summary {
    if !show_untracked {
        for result in results.values_mut() {
            result.untracked.clear();
        }
    }
    convert_results_to_summary(&results)
}

fn detail(item: &Item) -> String {
    if let Some(error) = item.meta.get(keys::DRIFT_ERROR) {
        return format!("drift check failed: {error}");
    }
    if item.meta.get(keys::DRIFT_STATUS).map(String::as_str) == Some(keys::DRIFT_MODIFIED) {
        return "modified since deploy".to_string();
    }
    if item.metadata.get_bool(keys::TEMPLATE) {
        return "template".to_string();
    }
    String::new()
}

fn display(app: &AppContext, summary: &Summary, show_untracked: bool) {
    ui::header("Status");
    ui::kv("Config", &app.config_dir.display().to_string());
    ui::kv("Home", &app.home.display().to_string());

    for result in &summary.results {
        let title = match &result.manager {
            Some(manager) => format!("Packages ({manager})"),
            None => "Dotfiles".to_string(),
        };
        ui::section(&title);

        let mut table = Table::new(&["NAME", "STATE", "DETAIL"]);
        let listed = result.managed.iter().chain(&result.missing);
        let untracked = result.untracked.iter().filter(|_| show_untracked);
        for item in listed.chain(untracked) {
            table.row(vec![item.name.clone(), item.state.to_string(), detail(item)]);
        }

        if table.is_empty() {
            ui::dim("nothing declared");
        } else {
            table.print();
        }
        if !show_untracked && !result.untracked.is_empty() {
            ui::dim(&format!(
                "{} untracked (use --unmanaged to list)",
                result.untracked.len()
            ));
        }
    }

    let degraded: usize = summary.results.iter().map(DomainResult::degraded_count).sum();
    println!();
    let line = format!(
        "{} managed ({} modified), {} missing, {} untracked",
        summary.total_managed, degraded, summary.total_missing, summary.total_untracked
    );
    if summary.total_missing == 0 && degraded == 0 {
        ui::success(&line);
    } else {
        ui::warn(&line);
        ui::info("Run `hearth apply` to converge");
    }
}
