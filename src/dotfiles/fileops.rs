//! File operations for deploying dotfiles
//!
//! Writes go to a temp file in the destination directory and are renamed into
//! place, so a crash never leaves a half-written dotfile behind.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Marker between a file name and its backup timestamp
pub const BACKUP_MARKER: &str = ".backup.";

const BACKUP_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

/// Atomically replace `path` with `contents`, creating parent directories
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    write_with_permissions(path, contents, None)
}

/// Atomically replace `path`, applying `permissions` before the rename
pub fn write_with_permissions(
    path: &Path,
    contents: &[u8],
    permissions: Option<Permissions>,
) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync temp file for {}", path.display()))?;

    if let Some(permissions) = permissions {
        fs::set_permissions(tmp.path(), permissions)
            .with_context(|| format!("Failed to set permissions for {}", path.display()))?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move file into place: {}", path.display()))?;
    Ok(())
}

/// Copy a file atomically, keeping the source's permission bits
pub fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let contents =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let permissions = fs::metadata(source)
        .with_context(|| format!("Failed to stat {}", source.display()))?
        .permissions();
    write_with_permissions(destination, &contents, Some(permissions))
}

/// Path a backup of `path` taken at `when` is written to
pub fn backup_path(path: &Path, when: DateTime<Local>) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_MARKER);
    name.push(when.format(BACKUP_TIMESTAMP).to_string());
    PathBuf::from(name)
}

/// First backup path for `when` that does not exist yet; later backups in
/// the same second get a `.1`, `.2`, ... suffix
fn free_backup_path(path: &Path, when: DateTime<Local>) -> PathBuf {
    let base = backup_path(path, when);
    let mut candidate = base.clone();
    let mut n = 0u32;
    while candidate.symlink_metadata().is_ok() {
        n += 1;
        let mut name = base.as_os_str().to_os_string();
        name.push(format!(".{n}"));
        candidate = PathBuf::from(name);
    }
    candidate
}

/// Copy `path` next to itself as `<path>.backup.<YYYYMMDD-HHMMSS>`
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let backup = free_backup_path(path, Local::now());
    copy_file(path, &backup)
        .with_context(|| format!("Failed to back up {}", path.display()))?;
    log::info!("Backed up {} to {}", path.display(), backup.display());
    Ok(backup)
}
