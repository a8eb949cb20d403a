//! `hearth search`: look a package up in every manager's registry

use anyhow::{Context as _, Result, bail};
use serde::Serialize;

use reconcile::Context;

use super::{DomainErrors, load_packages_for, print_domain_errors};
use crate::Context as AppContext;
use crate::cli::SearchArgs;
use crate::output::{self, Table};
use crate::packages::{PackageResource, describe_failure};
use crate::ui;

/// Matches reported by one manager
#[derive(Debug, Serialize)]
pub struct SearchHits {
    pub manager: String,
    pub packages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub results: Vec<SearchHits>,
    /// Managers whose search failed
    #[serde(skip_serializing_if = "DomainErrors::is_empty")]
    pub errors: DomainErrors,
}

pub fn run(app: &AppContext, args: &SearchArgs) -> Result<()> {
    let (prefix, query) = split_query(&args.query);
    let manager = args.manager.as_deref().or(prefix);
    let resource = load_packages_for(app, manager)?;
    let report = search(&resource, &app.operation(), query)?;

    if app.output.is_structured() {
        output::print(app.output, &report)?;
    } else {
        display(&report, manager);
    }

    if !report.errors.is_empty() {
        let managers: Vec<&str> = report.errors.keys().map(String::as_str).collect();
        bail!("search: {} failed", managers.join(", "));
    }
    Ok(())
}

/// Split `brew:ripgrep` into manager and query. A prefix that is not a
/// manager name is part of the query.
fn split_query(input: &str) -> (Option<&str>, &str) {
    let input = input.trim();
    match input.split_once(':') {
        Some((prefix, query)) if pkgkit::canonical_name(prefix).is_some() => (Some(prefix), query),
        _ => (None, input),
    }
}

pub(crate) fn search(resource: &PackageResource, ctx: &Context, query: &str) -> Result<SearchReport> {
    if query.is_empty() {
        bail!("search query is empty");
    }

    let mut report = SearchReport {
        query: query.to_string(),
        results: Vec::new(),
        errors: DomainErrors::new(),
    };
    let outcomes = resource
        .search(ctx, query)
        .with_context(|| format!("Failed to search for '{query}'"))?;
    for (manager, outcome) in outcomes {
        match outcome {
            Ok(packages) if packages.is_empty() => {}
            Ok(packages) => report.results.push(SearchHits { manager, packages }),
            Err(e) => {
                log::warn!("{manager} search failed: {e}");
                report.errors.insert(manager, describe_failure(&e));
            }
        }
    }
    report.results.sort_by(|a, b| a.manager.cmp(&b.manager));
    Ok(report)
}

fn display(report: &SearchReport, manager: Option<&str>) {
    print_domain_errors(&report.errors);

    if report.results.is_empty() {
        match manager {
            Some(manager) => ui::info(&format!("No match for '{}' in {manager}", report.query)),
            None => ui::info(&format!("No match for '{}'", report.query)),
        }
        return;
    }

    let mut table = Table::new(&["NAME", "MANAGER"]);
    for hits in &report.results {
        for package in &hits.packages {
            table.row(vec![package.clone(), hits.manager.clone()]);
        }
    }
    table.print();
}
