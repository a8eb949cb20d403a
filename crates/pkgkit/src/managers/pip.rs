//! Python packages installed with `pip --user`.

use crate::error::{Error, Result};
use crate::manager::{Cli, PackageInfo, PackageManager};
use crate::runner::CommandRunner;
use reconcile::Context;
use serde::Deserialize;
use std::sync::Arc;

pub struct Pip {
    cli: Cli,
}

#[derive(Deserialize)]
struct ListEntry {
    name: String,
}

impl Pip {
    pub const NAME: &'static str = "pip";

    pub fn new() -> Self {
        Self::with_runner(Arc::new(crate::runner::SystemRunner))
    }

    /// Prefers `pip3`, falling back to `pip`
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        let binary = if runner.exists("pip3") { "pip3" } else { "pip" };
        Self {
            cli: Cli::new(Self::NAME, binary, runner),
        }
    }

    /// Retry without `--user` when pip runs inside a virtualenv
    fn run_user(&self, ctx: &Context, args: &[&str], package: Option<&str>) -> Result<String> {
        let mut user_args = args.to_vec();
        user_args.insert(1, "--user");

        let output = self.cli.run(ctx, &user_args)?;
        if output.success {
            return Ok(output.stdout);
        }

        let combined = output.combined();
        if combined.contains("--user") || combined.contains("unknown option") {
            log::debug!("pip rejected --user, retrying without it");
            return self.cli.run_checked(ctx, args, package);
        }
        Err(Error::from_output(Self::NAME, &combined, package))
    }
}

impl Default for Pip {
    fn default() -> Self {
        Self::new()
    }
}

/// PEP 503 normalized project name, without any version specifier
pub fn normalize_name(spec: &str) -> String {
    let name = spec
        .split(['=', '<', '>', '!', '~', '[', ';', ' '])
        .next()
        .unwrap_or(spec);

    let mut normalized = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_was_sep {
                normalized.push('-');
            }
            last_was_sep = true;
        } else {
            normalized.extend(c.to_lowercase());
            last_was_sep = false;
        }
    }
    normalized
}

impl PackageManager for Pip {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn binary(&self) -> &str {
        self.cli.binary()
    }

    fn is_available(&self, ctx: &Context) -> Result<bool> {
        self.cli.available(ctx)
    }

    fn list_installed(&self, ctx: &Context) -> Result<Vec<String>> {
        let stdout = self.run_user(ctx, &["list", "--format=json"], None)?;
        let entries: Vec<ListEntry> = serde_json::from_str(stdout.trim())
            .map_err(|e| self.cli.parse_error(format!("pip list: {e}")))?;

        let mut names: Vec<String> = entries.iter().map(|e| normalize_name(&e.name)).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        match self.run_user(ctx, &["install", name], Some(name)) {
            Err(Error::AlreadyInstalled { .. }) => Ok(()),
            other => other.map(drop),
        }
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        self.cli.uninstall(ctx, &["uninstall", "-y", name], name)
    }

    fn search(&self, _ctx: &Context, _query: &str) -> Result<Vec<String>> {
        // PyPI disabled the XML-RPC endpoint behind `pip search`
        Err(self.cli.unsupported("search"))
    }

    fn supports_search(&self) -> bool {
        false
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        // `pip show` only knows installed distributions
        let stdout = self.cli.run_checked(ctx, &["show", name], Some(name))?;

        let mut info = PackageInfo::new(Self::NAME, name);
        info.installed = true;
        for line in stdout.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "Name" => info.name = value.to_string(),
                "Version" => info.version = Some(value.to_string()),
                "Summary" => info.description = Some(value.to_string()),
                "Home-page" => info.homepage = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(info)
    }

    fn installed_name(&self, spec: &str) -> String {
        normalize_name(spec)
    }
}
