//! The [`PackageManager`] abstraction and the CLI plumbing shared by adapters.

use crate::error::{Error, Result};
use crate::runner::{CommandOutput, CommandRunner, SystemRunner};
use reconcile::Context;
use serde::Serialize;
use std::sync::Arc;

/// Details about a single package, as reported by its manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub installed: bool,
    pub manager: String,
}

impl PackageInfo {
    pub fn new(manager: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            manager: manager.to_string(),
            ..Self::default()
        }
    }
}

/// A system package manager driven through its command-line interface.
///
/// Every operation takes a [`Context`]; a cancelled or expired context kills
/// the running command and surfaces as [`Error::Cancelled`] or
/// [`Error::DeadlineExceeded`].
pub trait PackageManager: Send + Sync {
    /// Canonical manager name, as used in the lock file
    fn name(&self) -> &'static str;

    /// Executable the adapter drives
    fn binary(&self) -> &str;

    /// Whether the manager is installed and functional.
    ///
    /// A missing binary is `Ok(false)`, not an error.
    fn is_available(&self, ctx: &Context) -> Result<bool>;

    /// Names of the installed packages
    fn list_installed(&self, ctx: &Context) -> Result<Vec<String>>;

    /// Install a package. Installing one that is present succeeds.
    fn install(&self, ctx: &Context, name: &str) -> Result<()>;

    /// Uninstall a package. Removing one that is absent succeeds.
    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()>;

    /// Search the manager's registry
    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>>;

    /// Whether [`search`](Self::search) is implemented
    fn supports_search(&self) -> bool {
        true
    }

    /// Describe a package
    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo>;

    /// Whether `name` is installed
    fn is_installed(&self, ctx: &Context, name: &str) -> Result<bool> {
        let wanted = self.installed_name(name);
        Ok(self.list_installed(ctx)?.iter().any(|p| *p == wanted))
    }

    /// Name under which an install spec shows up in [`list_installed`](Self::list_installed).
    ///
    /// Identity for most managers; `go` maps a module path to its binary name.
    fn installed_name(&self, spec: &str) -> String {
        spec.to_string()
    }
}

impl std::fmt::Debug for dyn PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageManager")
            .field("name", &self.name())
            .field("binary", &self.binary())
            .finish()
    }
}

/// Command plumbing shared by the CLI-backed adapters
#[derive(Clone)]
pub(crate) struct Cli {
    manager: &'static str,
    binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl Cli {
    pub(crate) fn new(manager: &'static str, binary: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            manager,
            binary: binary.to_string(),
            runner,
        }
    }

    pub(crate) fn system(manager: &'static str, binary: &str) -> Self {
        Self::new(manager, binary, Arc::new(SystemRunner))
    }

    pub(crate) fn binary(&self) -> &str {
        &self.binary
    }

    pub(crate) fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Run without interpreting the exit status
    pub(crate) fn run(&self, ctx: &Context, args: &[&str]) -> Result<CommandOutput> {
        self.runner.run(ctx, &self.binary, args)
    }

    /// Run and turn a non-zero exit into a categorized error
    pub(crate) fn run_checked(
        &self,
        ctx: &Context,
        args: &[&str],
        package: Option<&str>,
    ) -> Result<String> {
        let output = self.run(ctx, args)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::from_output(self.manager, &output.combined(), package))
        }
    }

    /// `<binary> --version` succeeds
    pub(crate) fn available(&self, ctx: &Context) -> Result<bool> {
        if !self.runner.exists(&self.binary) {
            return Ok(false);
        }
        match self.run(ctx, &["--version"]) {
            Ok(output) => Ok(output.success),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                log::debug!("{} is not functional: {}", self.manager, e);
                Ok(false)
            }
        }
    }

    /// Install, treating "already installed" as success
    pub(crate) fn install(&self, ctx: &Context, args: &[&str], name: &str) -> Result<()> {
        match self.run_checked(ctx, args, Some(name)) {
            Err(Error::AlreadyInstalled { .. }) => {
                log::debug!("{}: {} already installed", self.manager, name);
                Ok(())
            }
            other => other.map(drop),
        }
    }

    /// Uninstall, treating "not installed" as success
    pub(crate) fn uninstall(&self, ctx: &Context, args: &[&str], name: &str) -> Result<()> {
        match self.run_checked(ctx, args, Some(name)) {
            Err(Error::NotInstalled { .. }) => {
                log::debug!("{}: {} not installed", self.manager, name);
                Ok(())
            }
            other => other.map(drop),
        }
    }

    pub(crate) fn parse_error(&self, message: impl std::fmt::Display) -> Error {
        Error::Parse {
            manager: self.manager.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn unsupported(&self, operation: &str) -> Error {
        Error::Unsupported {
            manager: self.manager.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Non-empty trimmed lines of command output
pub(crate) fn output_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
