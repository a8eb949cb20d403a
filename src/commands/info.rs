//! `hearth info`: details about one package

use anyhow::{Context as _, Result};
use serde::Serialize;

use pkgkit::PackageInfo;
use reconcile::Context;

use super::load_packages;
use crate::Context as AppContext;
use crate::cli::InfoArgs;
use crate::output;
use crate::packages::{PackageRef, PackageResource};
use crate::ui;

#[derive(Debug, Serialize)]
pub struct InfoReport {
    #[serde(flatten)]
    pub info: PackageInfo,
    /// Whether the lock records the package
    pub managed: bool,
}

pub fn run(app: &AppContext, args: &InfoArgs) -> Result<()> {
    let resource = load_packages(app)?;
    let ctx = app.operation();
    let package = resolve(
        &resource,
        &ctx,
        &args.package,
        args.manager.as_deref(),
        &app.config.default_manager,
    )?;
    let report = describe(&resource, &ctx, &package)?;

    if app.output.is_structured() {
        return output::print(app.output, &report);
    }
    display(&report);
    Ok(())
}

/// Bind the input to a manager: its prefix, then `--manager`, then the
/// manager whose lock entry holds it, then one that has it installed, then
/// the default
fn resolve(
    resource: &PackageResource,
    ctx: &Context,
    input: &str,
    flag: Option<&str>,
    default_manager: &str,
) -> Result<PackageRef> {
    let fallback = match flag {
        Some(manager) => manager.to_string(),
        None if input.contains(':') => default_manager.to_string(),
        None => {
            let name = PackageRef::bare_name(input);
            resource
                .locked_manager(name)
                .or_else(|| resource.installed_manager(ctx, name))
                .unwrap_or_else(|| default_manager.to_string())
        }
    };
    PackageRef::parse(input, &fallback)
}

fn describe(resource: &PackageResource, ctx: &Context, package: &PackageRef) -> Result<InfoReport> {
    let info = resource
        .info(ctx, package)
        .with_context(|| format!("Failed to get information about {package}"))?;
    let managed = resource.lock().has_package(&package.manager, &package.name);
    Ok(InfoReport { info, managed })
}

fn display(report: &InfoReport) {
    let info = &report.info;
    ui::header(&format!("{} ({})", info.name, info.manager));
    ui::kv("Version", info.version.as_deref().unwrap_or("unknown"));
    if let Some(description) = &info.description {
        ui::kv("Description", description);
    }
    if let Some(homepage) = &info.homepage {
        ui::kv("Homepage", homepage);
    }
    ui::kv("Installed", yes_no(info.installed));
    ui::kv("Managed", yes_no(report.managed));

    if info.installed && !report.managed {
        println!();
        ui::dim(&format!("hearth install {}:{} to record it in the lock", info.manager, info.name));
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::Lock;
    use crate::packages::testing::FakeManager;
    use pkgkit::{AvailabilityCache, PackageManager};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn resource(dir: &TempDir, lock: Lock, managers: Vec<Arc<dyn PackageManager>>) -> PackageResource {
        PackageResource::new(
            dir.path(),
            lock,
            managers,
            Arc::new(AvailabilityCache::default()),
            Duration::from_secs(5),
        )
    }

    fn managers() -> Vec<Arc<dyn PackageManager>> {
        vec![
            Arc::new(FakeManager::new("brew").with_catalog(&["typescript", "jq"])),
            Arc::new(FakeManager::new("cargo").with_installed(&["ripgrep"])),
            Arc::new(FakeManager::new("npm").with_installed(&["typescript"])),
        ]
    }

    #[test]
    fn test_resolve_order() {
        let dir = TempDir::new().unwrap();
        let mut lock = Lock::default();
        lock.add_package("npm", "typescript");
        let res = resource(&dir, lock, managers());
        let ctx = Context::new();

        let resolved = |input: &str, flag: Option<&str>| resolve(&res, &ctx, input, flag, "brew").unwrap().to_string();
        assert_eq!(resolved("cargo:ripgrep", Some("npm")), "cargo:ripgrep");
        assert_eq!(resolved("typescript", Some("brew")), "brew:typescript");
        assert_eq!(resolved("typescript", None), "npm:typescript");
        assert_eq!(resolved("ripgrep", None), "cargo:ripgrep");
        assert_eq!(resolved("jq", None), "brew:jq");
    }

    #[test]
    fn test_describe_managed_package() {
        let dir = TempDir::new().unwrap();
        let mut lock = Lock::default();
        lock.add_package("npm", "typescript");
        let res = resource(&dir, lock, managers());

        let report = describe(&res, &Context::new(), &PackageRef::parse("npm:typescript", "brew").unwrap()).unwrap();
        assert!(report.info.installed);
        assert!(report.managed);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "typescript");
        assert_eq!(json["manager"], "npm");
        assert_eq!(json["managed"], true);
        assert!(json.get("homepage").is_none());
    }

    #[test]
    fn test_describe_available_package() {
        let dir = TempDir::new().unwrap();
        let res = resource(&dir, Lock::default(), managers());

        let report = describe(&res, &Context::new(), &PackageRef::parse("jq", "brew").unwrap()).unwrap();
        assert!(!report.info.installed);
        assert!(!report.managed);
    }

    #[test]
    fn test_describe_unknown_package() {
        let dir = TempDir::new().unwrap();
        let res = resource(&dir, Lock::default(), managers());

        let err = describe(&res, &Context::new(), &PackageRef::parse("nope", "brew").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to get information about brew:nope");
        assert!(format!("{err:#}").contains("package not found"));
    }
}
