//! Ignore rules shared by the config-tree and home scans

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

use super::fileops::BACKUP_MARKER;
use crate::config::CONFIG_FILE;
use crate::lock::LOCK_FILE;

/// Directory in the config tree holding hearth's own state
pub const INTERNAL_DIR: &str = ".hearth";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default)]
pub struct Filter {
    patterns: Vec<Pattern>,
    /// Config dir relative to the scanned root, when it lies inside it
    config_dir: Option<PathBuf>,
}

impl Filter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid ignore pattern '{p}'")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            config_dir: None,
        })
    }

    /// Also skip the config directory when scanning `root`
    pub fn excluding_config_dir(mut self, config_dir: &Path, root: &Path) -> Self {
        self.config_dir = config_dir
            .strip_prefix(root)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(Path::to_path_buf);
        self
    }

    /// Whether the entry at `relative` (to the scan root) is excluded
    pub fn should_skip(&self, relative: &Path) -> bool {
        if relative == Path::new(CONFIG_FILE) || relative == Path::new(LOCK_FILE) {
            return true;
        }
        if relative.starts_with(INTERNAL_DIR) {
            return true;
        }
        if is_backup(relative) {
            return true;
        }
        if let Some(config_dir) = &self.config_dir {
            if relative.starts_with(config_dir) {
                return true;
            }
        }
        self.matches(relative)
    }

    /// Whether any ignore pattern matches the file name or the whole path
    pub fn matches(&self, relative: &Path) -> bool {
        let name = relative.file_name().map(Path::new);
        self.patterns.iter().any(|pattern| {
            name.is_some_and(|n| pattern.matches_path_with(n, MATCH_OPTIONS))
                || pattern.matches_path_with(relative, MATCH_OPTIONS)
        })
    }
}

/// Backups written before a restore (`.zshrc.backup.20250309-140507`)
fn is_backup(relative: &Path) -> bool {
    relative
        .file_name()
        .is_some_and(|name| name.to_string_lossy().contains(BACKUP_MARKER))
}
