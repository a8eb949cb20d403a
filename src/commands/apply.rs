//! `hearth apply`: install missing packages, deploy missing and drifted
//! dotfiles. Untracked items are left alone.

use anyhow::Result;

use reconcile::{ApplyOptions, OperationResult, ProgressCallback, ResourceBatch, apply_resources};

use super::{DomainErrors, load_dotfiles, load_packages, reconcile_domains, report_with_errors};
use crate::Context as AppContext;
use crate::cli::ApplyArgs;
use crate::dotfiles::DotfileResource;
use crate::packages::PackageResource;
use crate::progress::ProgressGroup;
use crate::ui;

pub fn run(app: &AppContext, args: &ApplyArgs) -> Result<()> {
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

    if app.interactive_output() {
        ui::header(if args.dry_run { "Apply (dry run)" } else { "Apply" });
    }

    let opts = ApplyOptions {
        dry_run: args.dry_run,
        ..ApplyOptions::default()
    };
    let progress = ProgressGroup::new(app.interactive_output());
    let (results, errors) = apply_domains(
        app,
        &ctx,
        packages.as_ref(),
        dotfiles.as_ref(),
        &opts,
        |_| progress.progress(),
    )?;

    report_with_errors(app, "apply", args.dry_run, &results, &errors)
}

/// Reconcile each domain, then apply packages and dotfiles side by side.
///
/// Domains that fail to reconcile are returned as errors and skipped; the
/// rest are still applied. Results list packages before dotfiles.
pub(crate) fn apply_domains<F, P>(
    app: &AppContext,
    ctx: &reconcile::Context,
    packages: Option<&PackageResource>,
    dotfiles: Option<&DotfileResource>,
    opts: &ApplyOptions,
    progress_for: F,
) -> Result<(Vec<OperationResult>, DomainErrors)>
where
    F: Fn(&str) -> P + Sync,
    P: ProgressCallback,
{
    let reconciled = reconcile_domains(app, ctx, packages, dotfiles);

    let mut batches = Vec::with_capacity(2);
    if let Some(packages) = packages {
        let items = reconciled.package_items();
        if !items.is_empty() {
            batches.push(ResourceBatch {
                resource: packages,
                ctx: ctx.clone(),
                items,
            });
        }
    }
    if let (Some(dotfiles), Some(items)) = (dotfiles, &reconciled.dotfiles) {
        batches.push(ResourceBatch {
            resource: dotfiles,
            ctx: ctx.with_timeout(app.config.dotfile_timeout()),
            items: items.clone(),
        });
    }

    let results = apply_resources(&batches, opts, progress_for)?
        .into_iter()
        .flat_map(|(_, results)| results)
        .collect();
    Ok((results, reconciled.errors))
}
