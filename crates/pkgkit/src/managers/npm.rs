//! Globally installed npm packages.

use crate::error::{Error, Result};
use crate::manager::{Cli, PackageInfo, PackageManager};
use crate::runner::CommandRunner;
use reconcile::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Npm {
    cli: Cli,
}

#[derive(Deserialize)]
struct ListOutput {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct ViewOutput {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    homepage: Option<String>,
}

impl Npm {
    pub const NAME: &'static str = "npm";

    pub fn new() -> Self {
        Self {
            cli: Cli::system(Self::NAME, "npm"),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cli: Cli::new(Self::NAME, "npm", runner),
        }
    }
}

impl Default for Npm {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageManager for Npm {
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
        let output = self.cli.run(ctx, &["list", "-g", "--depth=0", "--json"])?;

        // Exit code 1 only signals peer dependency warnings
        if !output.success && output.exit_code != Some(1) {
            return Err(Error::from_output(Self::NAME, &output.combined(), None));
        }
        if output.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed: ListOutput = serde_json::from_str(&output.stdout)
            .map_err(|e| self.cli.parse_error(format!("npm list: {e}")))?;
        Ok(parsed.dependencies.into_keys().collect())
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        self.cli.install(ctx, &["install", "-g", name], name)
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        // npm exits 0 when removing an absent package
        self.cli.uninstall(ctx, &["uninstall", "-g", name], name)
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>> {
        let output = self.cli.run(ctx, &["search", query, "--json"])?;
        if !output.success {
            if output.exit_code == Some(1) {
                return Ok(Vec::new());
            }
            return Err(Error::from_output(Self::NAME, &output.combined(), Some(query)));
        }

        let trimmed = output.stdout.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let hits: Vec<SearchHit> = serde_json::from_str(trimmed)?;
        Ok(hits
            .into_iter()
            .map(|h| h.name)
            .filter(|n| !n.is_empty())
            .collect())
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        let installed = self.is_installed(ctx, name)?;
        let stdout = self.cli.run_checked(ctx, &["view", name, "--json"], Some(name))?;
        let view: ViewOutput = serde_json::from_str(&stdout)?;

        Ok(PackageInfo {
            name: view.name.unwrap_or_else(|| name.to_string()),
            version: view.version,
            description: view.description,
            homepage: view.homepage,
            installed,
            manager: Self::NAME.to_string(),
        })
    }
}
