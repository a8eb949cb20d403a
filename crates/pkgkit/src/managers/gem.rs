//! Ruby gems that ship executables.

use crate::error::{Error, Result};
use crate::manager::{Cli, PackageInfo, PackageManager, output_lines};
use crate::runner::CommandRunner;
use reconcile::Context;
use std::sync::Arc;
use std::time::Duration;

/// Budget for each per-gem executables lookup
const INSPECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Gem {
    cli: Cli,
}

impl Gem {
    pub const NAME: &'static str = "gem";

    pub fn new() -> Self {
        Self {
            cli: Cli::system(Self::NAME, "gem"),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cli: Cli::new(Self::NAME, "gem", runner),
        }
    }

    fn local_gems(&self, ctx: &Context) -> Result<Vec<String>> {
        let stdout = self
            .cli
            .run_checked(ctx, &["list", "--local", "--no-versions"], None)?;
        Ok(output_lines(&stdout)
            .into_iter()
            .filter(|l| !l.starts_with("***"))
            .collect())
    }

    /// Library-only gems are dependencies, not something a user installs
    fn has_executables(&self, ctx: &Context, gem: &str) -> Result<bool> {
        let scoped = ctx.with_timeout(INSPECT_TIMEOUT);
        match self.cli.run(&scoped, &["contents", gem, "--executables"]) {
            Ok(output) => Ok(output.success && !output.stdout.trim().is_empty()),
            Err(e) if ctx.check().is_err() => Err(e),
            Err(e) => {
                log::debug!("gem contents {gem}: {e}");
                Ok(false)
            }
        }
    }
}

impl Default for Gem {
    fn default() -> Self {
        Self::new()
    }
}

/// `rails (7.1.3)` -> `("rails", "7.1.3")`
fn parse_gem_line(line: &str) -> Option<(String, Option<String>)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("***") {
        return None;
    }
    match line.split_once(" (") {
        Some((name, rest)) => {
            let version = rest
                .trim_end_matches(')')
                .split(',')
                .next()
                .map(|v| v.trim().trim_start_matches("default: ").to_string());
            Some((name.to_string(), version))
        }
        None => Some((line.to_string(), None)),
    }
}

impl PackageManager for Gem {
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
        let mut installed = Vec::new();
        for gem in self.local_gems(ctx)? {
            if self.has_executables(ctx, &gem)? {
                installed.push(gem);
            }
        }
        Ok(installed)
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        let output = self.cli.run(ctx, &["install", name, "--user-install"])?;
        if output.success {
            return Ok(());
        }

        // Some rubies (rbenv, asdf) reject --user-install
        if output.combined().contains("--user-install") {
            return self.cli.install(ctx, &["install", name], name);
        }
        match Error::from_output(Self::NAME, &output.combined(), Some(name)) {
            Error::AlreadyInstalled { .. } => Ok(()),
            e => Err(e),
        }
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        // -x removes executables, -a every version, -I skips dependency checks
        self.cli
            .uninstall(ctx, &["uninstall", name, "-x", "-a", "-I"], name)
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>> {
        let stdout = self.cli.run_checked(ctx, &["search", query], Some(query))?;
        Ok(stdout
            .lines()
            .filter_map(parse_gem_line)
            .map(|(name, _)| name)
            .collect())
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        let installed = self.local_gems(ctx)?.iter().any(|g| g == name);
        let args: &[&str] = if installed {
            &["info", name, "--local"]
        } else {
            &["info", name, "--remote"]
        };
        let stdout = self.cli.run_checked(ctx, args, Some(name))?;

        let mut info = PackageInfo::new(Self::NAME, name);
        info.installed = installed;

        let mut found = false;
        for line in stdout.lines() {
            let trimmed = line.trim();
            if !line.starts_with(char::is_whitespace) {
                if let Some((gem, version)) = parse_gem_line(line) {
                    if gem == name {
                        found = true;
                        info.version = version;
                    }
                }
            } else if let Some(homepage) = trimmed.strip_prefix("Homepage:") {
                info.homepage = Some(homepage.trim().to_string());
            } else if !trimmed.is_empty() && !trimmed.contains(": ") {
                // The free-text summary is the indented line without a key
                info.description = Some(trimmed.to_string());
            }
        }

        if !found {
            return Err(Error::NotFound {
                manager: Self::NAME.to_string(),
                name: name.to_string(),
            });
        }
        Ok(info)
    }
}
