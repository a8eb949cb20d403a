//! Binaries installed with `cargo install`.

use crate::error::{Error, Result};
use crate::manager::{Cli, PackageInfo, PackageManager};
use crate::runner::CommandRunner;
use reconcile::Context;
use std::sync::Arc;

const SEARCH_LIMIT: &str = "20";

pub struct Cargo {
    cli: Cli,
}

impl Cargo {
    pub const NAME: &'static str = "cargo";

    pub fn new() -> Self {
        Self {
            cli: Cli::system(Self::NAME, "cargo"),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cli: Cli::new(Self::NAME, "cargo", runner),
        }
    }

    /// `(crate, version)` pairs from `cargo install --list`
    fn installed_crates(&self, ctx: &Context) -> Result<Vec<(String, String)>> {
        let stdout = self.cli.run_checked(ctx, &["install", "--list"], None)?;
        Ok(parse_install_list(&stdout))
    }
}

impl Default for Cargo {
    fn default() -> Self {
        Self::new()
    }
}

/// Crate headers are unindented (`ripgrep v14.1.0:`), binaries indented below
fn parse_install_list(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter(|l| !l.starts_with(char::is_whitespace) && l.trim_end().ends_with(':'))
        .filter_map(|l| {
            let mut parts = l.trim_end().trim_end_matches(':').split_whitespace();
            let name = parts.next()?.to_string();
            let version = parts.next().unwrap_or_default().trim_start_matches('v').to_string();
            Some((name, version))
        })
        .collect()
}

/// One `name = "version"    # description` line of `cargo search`
fn parse_search_line(line: &str) -> Option<(String, String, Option<String>)> {
    let (spec, description) = match line.split_once('#') {
        Some((spec, desc)) => (spec, Some(desc.trim().to_string())),
        None => (line, None),
    };
    let (name, version) = spec.split_once('=')?;
    Some((
        name.trim().to_string(),
        version.trim().trim_matches('"').to_string(),
        description.filter(|d| !d.is_empty()),
    ))
}

impl PackageManager for Cargo {
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
        Ok(self
            .installed_crates(ctx)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        self.cli.install(ctx, &["install", name], name)
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        self.cli.uninstall(ctx, &["uninstall", name], name)
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>> {
        let stdout = self
            .cli
            .run_checked(ctx, &["search", query, "--limit", SEARCH_LIMIT], Some(query))?;
        Ok(stdout
            .lines()
            .filter_map(parse_search_line)
            .map(|(name, _, _)| name)
            .collect())
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        let installed_version = self
            .installed_crates(ctx)?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v);

        let stdout = self
            .cli
            .run_checked(ctx, &["search", name, "--limit", "1"], Some(name))?;
        let hit = stdout
            .lines()
            .filter_map(parse_search_line)
            .find(|(n, _, _)| n == name);

        if hit.is_none() && installed_version.is_none() {
            return Err(Error::NotFound {
                manager: Self::NAME.to_string(),
                name: name.to_string(),
            });
        }

        let (latest, description) = hit.map(|(_, v, d)| (Some(v), d)).unwrap_or_default();
        Ok(PackageInfo {
            name: name.to_string(),
            installed: installed_version.is_some(),
            version: installed_version.or(latest),
            description,
            homepage: Some(format!("https://crates.io/crates/{name}")),
            manager: Self::NAME.to_string(),
        })
    }
}
