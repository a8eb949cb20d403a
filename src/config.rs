//! User configuration (`hearth.toml` in the config directory).
//!
//! Every field has a default, so a missing file is a valid zero-config setup.
//! Values are validated at load; a bad value fails fast naming the field.

use anyhow::{Context, Result};
use pkgkit::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "hearth.toml";

const MAX_OPERATION_TIMEOUT: u64 = 3600;
const MAX_PACKAGE_TIMEOUT: u64 = 1800;
const MAX_DOTFILE_TIMEOUT: u64 = 600;
const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid config field '{field}': {reason}")]
pub struct ConfigError {
    pub field: String,
    pub reason: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Manager used by `install` when none is given
    pub default_manager: String,
    /// Whole-command budget, in seconds
    pub operation_timeout: u64,
    /// Budget for one package manager call, in seconds
    pub package_timeout: u64,
    /// Budget for dotfile scans and deploys, in seconds
    pub dotfile_timeout: u64,
    /// Attempts per package manager call, counting the first
    pub retry_attempts: u32,
    /// Home subdirectories whose files are tracked individually
    pub expand_directories: Vec<String>,
    /// Glob patterns excluded from dotfile scans
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_manager: "brew".to_string(),
            operation_timeout: 300,
            package_timeout: 180,
            dotfile_timeout: 60,
            retry_attempts: 3,
            expand_directories: vec![".config".to_string()],
            ignore_patterns: [
                ".DS_Store",
                ".git",
                "*.backup",
                "*.tmp",
                "*.swp",
                ".cache",
                ".npm",
                ".cargo",
                ".rustup",
                ".local",
                ".Trash",
                ".ssh",
                ".gnupg",
                "*_history",
                "*.pem",
                "*.key",
                "hearth.lock",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

impl Config {
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE)
    }

    /// Load and validate the config, falling back to defaults when absent
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = Self::path(config_dir);
        if !path.exists() {
            log::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Check every field, normalizing the manager name to its canonical form
    pub fn validate(&mut self) -> std::result::Result<(), ConfigError> {
        match pkgkit::canonical_name(&self.default_manager) {
            Some(name) => self.default_manager = name.to_string(),
            None => {
                return Err(ConfigError::new(
                    "default_manager",
                    format!(
                        "unknown manager '{}' (known: {})",
                        self.default_manager,
                        pkgkit::KNOWN_MANAGERS.join(", ")
                    ),
                ));
            }
        }

        check_timeout("operation_timeout", self.operation_timeout, MAX_OPERATION_TIMEOUT)?;
        check_timeout("package_timeout", self.package_timeout, MAX_PACKAGE_TIMEOUT)?;
        check_timeout("dotfile_timeout", self.dotfile_timeout, MAX_DOTFILE_TIMEOUT)?;
        if self.retry_attempts == 0 || self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::new(
                "retry_attempts",
                format!("must be between 1 and {MAX_RETRY_ATTEMPTS}"),
            ));
        }

        for pattern in &self.ignore_patterns {
            if pattern.trim().is_empty() {
                return Err(ConfigError::new("ignore_patterns", "empty pattern"));
            }
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::new("ignore_patterns", format!("invalid pattern '{pattern}': {e}"))
            })?;
        }

        for dir in &self.expand_directories {
            let path = Path::new(dir);
            if dir.trim().is_empty() {
                return Err(ConfigError::new("expand_directories", "empty directory"));
            }
            if path.is_absolute() {
                return Err(ConfigError::new(
                    "expand_directories",
                    format!("'{dir}' must be relative to the home directory"),
                ));
            }
            if path.components().any(|c| c == Component::ParentDir) {
                return Err(ConfigError::new(
                    "expand_directories",
                    format!("'{dir}' must not escape the home directory"),
                ));
            }
        }

        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout)
    }

    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.package_timeout)
    }

    pub fn dotfile_timeout(&self) -> Duration {
        Duration::from_secs(self.dotfile_timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            ..RetryPolicy::default()
        }
    }
}

fn check_timeout(field: &str, value: u64, max: u64) -> std::result::Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::new(
            field,
            format!("{value}s is out of range (1-{max}s)"),
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
