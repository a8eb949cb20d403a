//! Filesystem scans producing the desired (config tree) and actual (home)
//! dotfile sets

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use reconcile::Context;

use super::filter::Filter;
use crate::paths;

/// How deep below an expanded directory files are still listed
pub const MAX_EXPAND_DEPTH: usize = 3;

/// A source file in the config directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path relative to the config directory
    pub relative: PathBuf,
    /// Target path relative to home
    pub target: PathBuf,
}

impl SourceEntry {
    pub fn is_template(&self) -> bool {
        paths::is_template(&self.relative)
    }
}

/// A dotfile or dot-directory found under home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeEntry {
    /// Path relative to home, used as the item name
    pub relative: PathBuf,
    pub is_dir: bool,
}

/// List every managed source file in the config directory, sorted.
///
/// Dot-prefixed entries at the top of the config dir (`.git`, `.hearth`)
/// are repository plumbing, not dotfiles. A missing config dir is empty.
pub fn scan_config_dir(config_dir: &Path, filter: &Filter) -> Vec<SourceEntry> {
    if !config_dir.is_dir() {
        log::debug!("Config dir {} does not exist", config_dir.display());
        return Vec::new();
    }

    let walker = WalkDir::new(config_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let Ok(relative) = entry.path().strip_prefix(config_dir) else {
                return false;
            };
            let hidden = entry.depth() == 1 && entry.file_name().to_string_lossy().starts_with('.');
            !hidden && !filter.should_skip(relative)
        });

    let mut sources = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable entry in config dir: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(config_dir) {
            sources.push(SourceEntry {
                relative: relative.to_path_buf(),
                target: paths::source_to_target(relative),
            });
        }
    }
    sources
}

/// List dotfiles under home.
///
/// Top-level dot entries are listed as they are, except those named in
/// `expand_directories`, whose files are listed individually down to
/// [`MAX_EXPAND_DEPTH`]. Unreadable entries are skipped.
pub fn scan_home(
    ctx: &Context,
    home: &Path,
    expand_directories: &[String],
    filter: &Filter,
) -> reconcile::Result<Vec<HomeEntry>> {
    ctx.check()?;

    let mut entries = Vec::new();
    let read = fs::read_dir(home).map_err(|e| reconcile::Error::scan("dotfiles", e))?;
    let mut top_level: Vec<_> = read
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping unreadable entry in {}: {}", home.display(), e);
                None
            }
        })
        .collect();
    top_level.sort_by_key(fs::DirEntry::file_name);

    for entry in top_level {
        ctx.check()?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with('.') {
            continue;
        }
        let relative = PathBuf::from(&name);
        if filter.should_skip(&relative) {
            continue;
        }
        if expand_directories.iter().any(|d| Path::new(d) == relative) {
            continue;
        }
        let is_dir = match entry.file_type() {
            Ok(t) => t.is_dir(),
            Err(e) => {
                log::debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        entries.push(HomeEntry { relative, is_dir });
    }

    for dir in expand_directories {
        ctx.check()?;
        expand_directory(ctx, home, Path::new(dir), filter, &mut entries)?;
    }

    entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    entries.dedup_by(|a, b| a.relative == b.relative);
    Ok(entries)
}

fn expand_directory(
    ctx: &Context,
    home: &Path,
    dir: &Path,
    filter: &Filter,
    entries: &mut Vec<HomeEntry>,
) -> reconcile::Result<()> {
    let root = home.join(dir);
    if !root.is_dir() {
        return Ok(());
    }

    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(MAX_EXPAND_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(home)
                .is_ok_and(|relative| !filter.should_skip(relative))
        });

    for entry in walker {
        ctx.check()?;
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(home) {
            entries.push(HomeEntry {
                relative: relative.to_path_buf(),
                is_dir: false,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn filter(patterns: &[&str]) -> Filter {
        let patterns: Vec<String> = patterns.iter().map(|s| (*s).to_string()).collect();
        Filter::new(&patterns).unwrap()
    }

    fn names(entries: &[HomeEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.relative.display().to_string())
            .collect()
    }

    #[test]
    fn test_scan_config_dir() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "zshrc");
        touch(dir.path(), "config/nvim/init.lua");
        touch(dir.path(), "gitconfig.tmpl");
        touch(dir.path(), "hearth.toml");
        touch(dir.path(), "hearth.lock");
        touch(dir.path(), ".hearth/local.yaml");
        touch(dir.path(), ".git/HEAD");
        touch(dir.path(), "vimrc.swp");

        let sources = scan_config_dir(dir.path(), &filter(&["*.swp"]));
        let targets: Vec<_> = sources.iter().map(|s| s.target.clone()).collect();
        assert_eq!(
            targets,
            [
                PathBuf::from(".config/nvim/init.lua"),
                PathBuf::from(".gitconfig"),
                PathBuf::from(".zshrc"),
            ]
        );
        assert!(sources[1].is_template());
        assert!(!sources[2].is_template());
    }

    #[test]
    fn test_scan_missing_config_dir() {
        let dir = TempDir::new().unwrap();
        assert!(scan_config_dir(&dir.path().join("none"), &filter(&[])).is_empty());
    }

    #[test]
    fn test_scan_home_top_level() {
        let home = TempDir::new().unwrap();
        touch(home.path(), ".zshrc");
        touch(home.path(), ".vim/colors/x.vim");
        touch(home.path(), "Documents/notes.txt");
        touch(home.path(), ".DS_Store");

        let entries = scan_home(&Context::new(), home.path(), &[], &filter(&[".DS_Store"])).unwrap();
        assert_eq!(names(&entries), [".vim", ".zshrc"]);
        assert!(entries[0].is_dir);
        assert!(!entries[1].is_dir);
    }

    #[test]
    fn test_scan_home_expands_directories() {
        let home = TempDir::new().unwrap();
        touch(home.path(), ".config/nvim/init.lua");
        touch(home.path(), ".config/git/config");
        touch(home.path(), ".config/a/b/c/too-deep");
        touch(home.path(), ".config/hearth/zshrc");

        let filter = filter(&[]).excluding_config_dir(&home.path().join(".config/hearth"), home.path());
        let entries = scan_home(&Context::new(), home.path(), &[".config".to_string()], &filter).unwrap();
        assert_eq!(names(&entries), [".config/git/config", ".config/nvim/init.lua"]);
    }

    #[test]
    fn test_scan_home_cancelled() {
        let home = TempDir::new().unwrap();
        let ctx = Context::new();
        ctx.cancel();
        let err = scan_home(&ctx, home.path(), &[], &filter(&[])).unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_scan_home_missing_is_error() {
        let home = TempDir::new().unwrap();
        let missing = home.path().join("nope");
        assert!(scan_home(&Context::new(), &missing, &[], &filter(&[])).is_err());
    }
}
