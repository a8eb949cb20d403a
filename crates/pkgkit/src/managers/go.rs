//! Go binaries installed with `go install`.
//!
//! Packages are requested by module path (`golang.org/x/tools/gopls`) but
//! show up under their binary name (`gopls`) in `$GOBIN`, so
//! [`PackageManager::installed_name`] maps one to the other.

use crate::error::{Error, Result};
use crate::manager::{Cli, PackageInfo, PackageManager};
use crate::runner::CommandRunner;
use reconcile::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Budget for each `go version -m` call
const INSPECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct GoInstall {
    cli: Cli,
}

impl GoInstall {
    pub const NAME: &'static str = "go";

    pub fn new() -> Self {
        Self {
            cli: Cli::system(Self::NAME, "go"),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cli: Cli::new(Self::NAME, "go", runner),
        }
    }

    fn go_env(&self, ctx: &Context, key: &str) -> Result<String> {
        let stdout = self.cli.run_checked(ctx, &["env", key], None)?;
        Ok(stdout.trim().to_string())
    }

    /// `$GOBIN`, else `$GOPATH/bin`, else `~/go/bin`
    pub fn bin_dir(&self, ctx: &Context) -> Result<PathBuf> {
        let gobin = self.go_env(ctx, "GOBIN")?;
        if !gobin.is_empty() {
            return Ok(PathBuf::from(gobin));
        }

        let gopath = self.go_env(ctx, "GOPATH")?;
        // GOPATH may be a list; binaries land in the first entry
        if let Some(first) = std::env::split_paths(&gopath).next() {
            if !first.as_os_str().is_empty() {
                return Ok(first.join("bin"));
            }
        }

        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join("go").join("bin"))
            .ok_or_else(|| self.cli.parse_error("cannot determine GOPATH"))
    }

    /// `go version -m` succeeds only on binaries built by the Go toolchain
    fn build_info(&self, ctx: &Context, binary: &Path) -> Result<Option<String>> {
        let scoped = ctx.with_timeout(INSPECT_TIMEOUT);
        let path = binary.to_string_lossy();
        match self.cli.run(&scoped, &["version", "-m", &path]) {
            Ok(output) if output.success => Ok(Some(output.stdout)),
            Ok(_) => Ok(None),
            Err(e) if ctx.check().is_err() => Err(e),
            Err(e) => {
                log::debug!("go version -m {path}: {e}");
                Ok(None)
            }
        }
    }
}

impl Default for GoInstall {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `module@version`, defaulting to `latest`
fn module_spec(spec: &str) -> (&str, &str) {
    match spec.split_once('@') {
        Some((module, version)) if !version.is_empty() => (module, version),
        Some((module, _)) => (module, "latest"),
        None => (spec, "latest"),
    }
}

/// Binary name for a module path: its last path segment
pub fn binary_name(spec: &str) -> String {
    let (module, _) = module_spec(spec);
    module
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(module)
        .to_string()
}

/// `(module path, version)` from `go version -m` output
fn parse_build_info(output: &str) -> (Option<String>, Option<String>) {
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() == Some(&"mod") && fields.len() >= 3 {
            return (Some(fields[1].to_string()), Some(fields[2].to_string()));
        }
    }
    (None, None)
}

impl PackageManager for GoInstall {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn binary(&self) -> &str {
        self.cli.binary()
    }

    fn is_available(&self, ctx: &Context) -> Result<bool> {
        if !self.cli.runner().exists(self.cli.binary()) {
            return Ok(false);
        }
        match self.cli.run(ctx, &["version"]) {
            Ok(output) => Ok(output.success && output.stdout.contains("go1.")),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                log::debug!("go is not functional: {e}");
                Ok(false)
            }
        }
    }

    fn list_installed(&self, ctx: &Context) -> Result<Vec<String>> {
        let dir = self.bin_dir(ctx)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut binaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if self.build_info(ctx, &path)?.is_some() {
                binaries.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        binaries.sort();
        Ok(binaries)
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        let (module, version) = module_spec(name);
        let target = format!("{module}@{version}");
        self.cli.install(ctx, &["install", &target], name)?;

        if let Ok(dir) = self.bin_dir(ctx) {
            let on_path = std::env::var_os("PATH")
                .is_some_and(|p| std::env::split_paths(&p).any(|entry| entry == dir));
            if !on_path {
                log::warn!("{} is not in PATH; installed Go tools won't be found", dir.display());
            }
        }
        Ok(())
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        let binary = binary_name(name);
        let path = self.bin_dir(ctx)?.join(&binary);
        if !path.exists() {
            return Ok(());
        }

        if self.build_info(ctx, &path)?.is_none() {
            return Err(Error::CommandFailed {
                manager: Self::NAME.to_string(),
                message: format!("'{binary}' is not a Go binary"),
                stderr: String::new(),
            });
        }

        fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => Error::Permission {
                manager: Self::NAME.to_string(),
                message: format!("cannot remove {}", path.display()),
            },
            _ => e.into(),
        })
    }

    fn search(&self, _ctx: &Context, _query: &str) -> Result<Vec<String>> {
        // No registry search in the go tool; pkg.go.dev is web-only
        Err(self.cli.unsupported("search"))
    }

    fn supports_search(&self) -> bool {
        false
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        let binary = binary_name(name);
        let path = self.bin_dir(ctx)?.join(&binary);
        let build = if path.is_file() {
            self.build_info(ctx, &path)?
        } else {
            None
        };

        let (module, version) = build.as_deref().map(parse_build_info).unwrap_or_default();
        let module = module.or_else(|| name.contains('/').then(|| module_spec(name).0.to_string()));

        Ok(PackageInfo {
            name: binary,
            installed: build.is_some(),
            version,
            description: None,
            homepage: module.map(|m| format!("https://pkg.go.dev/{m}")),
            manager: Self::NAME.to_string(),
        })
    }

    fn is_installed(&self, ctx: &Context, name: &str) -> Result<bool> {
        let path = self.bin_dir(ctx)?.join(binary_name(name));
        if !path.is_file() {
            return Ok(false);
        }
        Ok(self.build_info(ctx, &path)?.is_some())
    }

    fn installed_name(&self, spec: &str) -> String {
        binary_name(spec)
    }
}
