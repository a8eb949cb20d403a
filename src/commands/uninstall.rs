use anyhow::{Context as _, Result, bail};
use dialoguer::Confirm;
use std::io::IsTerminal;

use super::{load_packages, report};
use crate::Context as AppContext;
use crate::cli::UninstallArgs;
use crate::packages::{PackageRef, PackageResource};
use crate::ui;

pub fn run(app: &AppContext, args: &UninstallArgs) -> Result<()> {
    let resource = load_packages(app)?;
    let packages = resolve(
        &resource,
        &args.packages,
        args.manager.as_deref(),
        &app.config.default_manager,
    )?;

    if !args.dry_run && !args.yes && !confirm(&packages)? {
        ui::info("Cancelled");
        return Ok(());
    }

    let results = resource.uninstall(&app.operation(), &packages, args.dry_run);
    report(app, "uninstall", args.dry_run, &results)
}

/// Bind each input to a manager: its prefix, then `--manager`, then the
/// manager whose lock entry holds it, then the default
pub(crate) fn resolve(
    resource: &PackageResource,
    inputs: &[String],
    flag: Option<&str>,
    default_manager: &str,
) -> Result<Vec<PackageRef>> {
    inputs
        .iter()
        .map(|input| {
            let fallback = flag.map(str::to_string).unwrap_or_else(|| {
                resource
                    .locked_manager(PackageRef::bare_name(input))
                    .unwrap_or_else(|| default_manager.to_string())
            });
            PackageRef::parse(input, &fallback)
        })
        .collect()
}

fn confirm(packages: &[PackageRef]) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Refusing to uninstall without confirmation; pass --yes");
    }
    let list = packages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Confirm::new()
        .with_prompt(format!("Uninstall {list}?"))
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::Lock;
    use pkgkit::AvailabilityCache;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn resource_with(lock: Lock) -> (TempDir, PackageResource) {
        let dir = TempDir::new().unwrap();
        let resource = PackageResource::new(
            dir.path(),
            lock,
            Vec::new(),
            Arc::new(AvailabilityCache::default()),
            Duration::from_secs(5),
        );
        (dir, resource)
    }

    fn inputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_resolve_precedence() {
        let mut lock = Lock::default();
        lock.add_package("npm", "typescript");
        let (_dir, resource) = resource_with(lock);

        let refs = resolve(
            &resource,
            &inputs(&["typescript", "jq", "cargo:bat"]),
            None,
            "brew",
        )
        .unwrap();
        let rendered: Vec<_> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["npm:typescript", "brew:jq", "cargo:bat"]);

        let refs = resolve(&resource, &inputs(&["typescript", "cargo:bat"]), Some("gem"), "brew").unwrap();
        let rendered: Vec<_> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["gem:typescript", "cargo:bat"]);
    }

    #[test]
    fn test_resolve_rejects_unknown_manager() {
        let (_dir, resource) = resource_with(Lock::default());
        assert!(resolve(&resource, &inputs(&["apt:curl"]), None, "brew").is_err());
    }
}
