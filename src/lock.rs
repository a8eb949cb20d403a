//! Package lock file (`hearth.lock`)
//!
//! The lock records which packages each manager should have installed:
//!
//! ```yaml
//! version: 3
//! packages:
//!   brew:
//!     - jq
//!     - ripgrep
//!   cargo:
//!     - cargo-watch
//! ```
//!
//! Names are kept sorted and unique, and a manager whose list becomes empty
//! is dropped. Version 2 locks, which stored packages as generic resources,
//! are read and upgraded in memory; saving always writes version 3.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dotfiles::fileops;

/// Lock file name inside the config directory
pub const LOCK_FILE: &str = "hearth.lock";

/// Current lock format version
pub const LOCK_VERSION: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub version: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, BTreeSet<String>>,
}

impl Default for Lock {
    fn default() -> Self {
        Self {
            version: LOCK_VERSION,
            packages: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Version 2 (read-only)
// ============================================================================

#[derive(Debug, Deserialize)]
struct LockV2 {
    #[serde(default)]
    resources: Vec<ResourceV2>,
}

#[derive(Debug, Deserialize)]
struct ResourceV2 {
    #[serde(rename = "type", default)]
    resource_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: u32,
}

impl Lock {
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(LOCK_FILE)
    }

    /// Load the lock, returning an empty one when the file does not exist
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = Self::path(config_dir);
        if !path.exists() {
            log::debug!("No lock file at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid lock file {}", path.display()))
    }

    /// Parse lock content of any supported version
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let header: VersionHeader = serde_yaml::from_str(content).context("Malformed lock file")?;
        match header.version {
            LOCK_VERSION => {
                let mut lock: Self = serde_yaml::from_str(content).context("Malformed lock file")?;
                lock.packages.retain(|_, names| !names.is_empty());
                Ok(lock)
            }
            2 => {
                let legacy: LockV2 = serde_yaml::from_str(content).context("Malformed lock file")?;
                log::info!("Upgrading version 2 lock file");
                Ok(Self::from_v2(&legacy))
            }
            other => bail!("unsupported lock version {other}"),
        }
    }

    fn from_v2(legacy: &LockV2) -> Self {
        let mut lock = Self::default();
        for resource in &legacy.resources {
            if resource.resource_type != "package" {
                continue;
            }
            let field = |key: &str| {
                resource
                    .metadata
                    .get(key)
                    .and_then(serde_yaml::Value::as_str)
                    .filter(|s| !s.is_empty())
            };
            if let (Some(manager), Some(name)) = (field("manager"), field("name")) {
                lock.add_package(manager, name);
            }
        }
        lock
    }

    /// Write the lock atomically, creating the config directory if needed
    pub fn save(&mut self, config_dir: &Path) -> Result<()> {
        self.version = LOCK_VERSION;
        self.packages.retain(|_, names| !names.is_empty());

        let content = serde_yaml::to_string(self).context("Could not serialize lock file")?;
        let path = Self::path(config_dir);
        fileops::atomic_write(&path, content.as_bytes())
            .with_context(|| format!("Could not write {}", path.display()))?;
        log::debug!("Saved lock file {}", path.display());
        Ok(())
    }

    /// Record a package. Returns false when it was already present.
    pub fn add_package(&mut self, manager: &str, name: &str) -> bool {
        self.packages
            .entry(manager.to_string())
            .or_default()
            .insert(name.to_string())
    }

    /// Forget a package. Returns false when it was not recorded.
    pub fn remove_package(&mut self, manager: &str, name: &str) -> bool {
        let Some(names) = self.packages.get_mut(manager) else {
            return false;
        };
        let removed = names.remove(name);
        if names.is_empty() {
            self.packages.remove(manager);
        }
        removed
    }

    pub fn has_package(&self, manager: &str, name: &str) -> bool {
        self.packages
            .get(manager)
            .is_some_and(|names| names.contains(name))
    }

    /// Sorted package names recorded for one manager
    pub fn packages(&self, manager: &str) -> Vec<String> {
        self.packages
            .get(manager)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Managers with at least one recorded package, sorted
    pub fn managers(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    /// Every package as `manager:name`, sorted
    pub fn all_packages(&self) -> Vec<String> {
        self.packages
            .iter()
            .flat_map(|(manager, names)| names.iter().map(move |name| format!("{manager}:{name}")))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
