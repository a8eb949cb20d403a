//! Centralized path resolution for hearth
//!
//! # Environment Variables
//!
//! - `HEARTH_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/hearth`)
//! - `HEARTH_HOME` - Override the home directory dotfiles deploy into
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `HEARTH_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/hearth` (if set)
//! 3. `~/.config/hearth`
//!
//! # Dotfile Mapping
//!
//! Sources in the config directory carry no leading dot; the deployed target
//! gets one on its first component:
//!
//! | source                 | target                     |
//! |------------------------|----------------------------|
//! | `zshrc`                | `~/.zshrc`                 |
//! | `config/nvim/init.lua` | `~/.config/nvim/init.lua`  |
//! | `gitconfig.tmpl`       | `~/.gitconfig`             |

use anyhow::{Context, Result, bail};
use std::path::{Component, Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "HEARTH_CONFIG_DIR";

/// Environment variable for home directory override
pub const ENV_HOME: &str = "HEARTH_HOME";

/// Suffix marking a source as a template
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Get the hearth config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        if !dir.is_empty() {
            let path = expand(&dir);
            log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
            return Ok(path);
        }
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config.is_empty() {
            let path = PathBuf::from(xdg_config).join("hearth");
            log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("hearth");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the home directory dotfiles are deployed into
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_HOME) {
        if !dir.is_empty() {
            return Ok(expand(&dir));
        }
    }
    dirs::home_dir().context("Could not determine home directory")
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as they are.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Whether a source path names a template
pub fn is_template(source: &Path) -> bool {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMPLATE_SUFFIX) && n.len() > TEMPLATE_SUFFIX.len())
}

/// Target path (relative to home) for a source path relative to the config dir
pub fn source_to_target(relative_source: &Path) -> PathBuf {
    let mut components = relative_source.components();
    let mut target = PathBuf::new();

    if let Some(first) = components.next() {
        let first = first.as_os_str().to_string_lossy();
        if first.starts_with('.') {
            target.push(first.as_ref());
        } else {
            target.push(format!(".{first}"));
        }
    }
    for component in components {
        target.push(component);
    }

    if is_template(&target) {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().trim_end_matches(TEMPLATE_SUFFIX).to_string());
        if let Some(name) = name {
            target.set_file_name(name);
        }
    }
    target
}

/// Source path (relative to the config dir) for a target path relative to home
pub fn target_to_source(relative_target: &Path) -> PathBuf {
    let mut components = relative_target.components();
    let mut source = PathBuf::new();

    if let Some(first) = components.next() {
        let first = first.as_os_str().to_string_lossy();
        source.push(first.strip_prefix('.').unwrap_or(&first));
    }
    for component in components {
        source.push(component);
    }
    source
}

/// Lexically normalize a path, resolving `.` and `..` without touching disk
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Resolve a user-supplied dotfile path against home, rejecting anything outside it.
///
/// Relative paths are taken relative to `cwd`; `~` and `$VARS` are expanded.
pub fn resolve_in_home(input: &str, home: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand(input);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    let normalized = normalize(&absolute);
    validate_in_home(&normalized, home)?;
    Ok(normalized)
}

/// Fail unless `path` lies strictly inside `home`
pub fn validate_in_home(path: &Path, home: &Path) -> Result<()> {
    let home = normalize(home);
    match path.strip_prefix(&home) {
        Ok(rel) if !rel.as_os_str().is_empty() => Ok(()),
        Ok(_) => bail!("{} is the home directory itself", path.display()),
        Err(_) => bail!(
            "{} is outside the home directory {}",
            path.display(),
            home.display()
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
