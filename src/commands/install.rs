use anyhow::Result;

use super::{load_packages, report};
use crate::Context as AppContext;
use crate::cli::InstallArgs;
use crate::packages::PackageRef;

pub fn run(app: &AppContext, args: &InstallArgs) -> Result<()> {
    let fallback = args
        .manager
        .as_deref()
        .unwrap_or(&app.config.default_manager);
    let packages = args
        .packages
        .iter()
        .map(|input| PackageRef::parse(input, fallback))
        .collect::<Result<Vec<_>>>()?;

    let resource = load_packages(app)?;
    let results = resource.install(&app.operation(), &packages, args.dry_run);
    report(app, "install", args.dry_run, &results)
}
