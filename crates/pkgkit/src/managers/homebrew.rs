//! Homebrew formulae and casks.

use crate::error::{Error, Result};
use crate::manager::{Cli, PackageInfo, PackageManager, output_lines};
use crate::runner::CommandRunner;
use reconcile::Context;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct Homebrew {
    cli: Cli,
}

impl Homebrew {
    pub const NAME: &'static str = "brew";

    pub fn new() -> Self {
        Self {
            cli: Cli::system(Self::NAME, "brew"),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cli: Cli::new(Self::NAME, "brew", runner),
        }
    }
}

impl Default for Homebrew {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageManager for Homebrew {
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
        let formulae = self.cli.run_checked(ctx, &["list", "--formula", "-1"], None)?;
        let mut names: BTreeSet<String> = output_lines(&formulae).into_iter().collect();

        // Casks only exist on macOS; a failure here must not hide the formulae
        match self.cli.run_checked(ctx, &["list", "--cask", "-1"], None) {
            Ok(casks) => names.extend(output_lines(&casks)),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => log::debug!("Skipping casks: {e}"),
        }

        Ok(names.into_iter().collect())
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        self.cli.install(ctx, &["install", name], name)
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        self.cli.uninstall(ctx, &["uninstall", name], name)
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>> {
        let output = self.cli.run(ctx, &["search", query])?;
        if !output.success {
            if output.combined().contains("No formulae or casks found") {
                return Ok(Vec::new());
            }
            return Err(Error::from_output(Self::NAME, &output.combined(), Some(query)));
        }

        Ok(output
            .stdout
            .lines()
            .filter(|l| !l.starts_with("==>"))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect())
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        let stdout = self.cli.run_checked(ctx, &["info", "--json=v2", name], Some(name))?;
        let json: Value = serde_json::from_str(&stdout)?;

        if let Some(formula) = json["formulae"].as_array().and_then(|a| a.first()) {
            return Ok(formula_info(formula, name));
        }
        if let Some(cask) = json["casks"].as_array().and_then(|a| a.first()) {
            return Ok(cask_info(cask, name));
        }

        Err(Error::NotFound {
            manager: Self::NAME.to_string(),
            name: name.to_string(),
        })
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn formula_info(formula: &Value, name: &str) -> PackageInfo {
    let installed_version = formula["installed"]
        .as_array()
        .and_then(|a| a.last())
        .and_then(|i| text(&i["version"]));

    PackageInfo {
        name: text(&formula["name"]).unwrap_or_else(|| name.to_string()),
        installed: installed_version.is_some(),
        version: installed_version.or_else(|| text(&formula["versions"]["stable"])),
        description: text(&formula["desc"]),
        homepage: text(&formula["homepage"]),
        manager: Homebrew::NAME.to_string(),
    }
}

fn cask_info(cask: &Value, name: &str) -> PackageInfo {
    let installed_version = text(&cask["installed"]);

    PackageInfo {
        name: text(&cask["token"]).unwrap_or_else(|| name.to_string()),
        installed: installed_version.is_some(),
        version: installed_version.or_else(|| text(&cask["version"])),
        description: text(&cask["desc"]),
        homepage: text(&cask["homepage"]),
        manager: Homebrew::NAME.to_string(),
    }
}
