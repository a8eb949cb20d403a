//! `dot add` / `dot rm`: move dotfiles in and out of the config directory

use anyhow::{Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use reconcile::{Context, OperationResult, OperationStatus, keys};

use super::fileops;
use super::resource::DotfileResource;
use crate::paths::{self, TEMPLATE_SUFFIX};

/// Copy home dotfiles into the config directory.
///
/// Directories are expanded into one result per file. Re-adding a managed
/// file refreshes its source and reports `updated`.
pub fn add(
    ctx: &Context,
    resource: &DotfileResource,
    inputs: &[String],
    cwd: &Path,
    dry_run: bool,
) -> Vec<OperationResult> {
    let mut results = Vec::new();
    for input in inputs {
        if let Err(e) = ctx.check() {
            results.push(OperationResult::failed(input, e));
            continue;
        }

        let path = match resolve_dotfile(resource, input, cwd) {
            Ok(p) => p,
            Err(e) => {
                results.push(OperationResult::failed(input, format!("{e:#}")));
                continue;
            }
        };

        if path.is_dir() {
            add_directory(ctx, resource, input, &path, dry_run, &mut results);
        } else if path.is_file() {
            results.push(add_file(resource, &path, dry_run));
        } else {
            results.push(OperationResult::failed(
                input,
                format!("{} does not exist", path.display()),
            ));
        }
    }
    results
}

fn add_directory(
    ctx: &Context,
    resource: &DotfileResource,
    input: &str,
    dir: &Path,
    dry_run: bool,
    results: &mut Vec<OperationResult>,
) {
    let home = resource.home();
    let filter = resource.home_filter();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(home)
                .is_ok_and(|rel| !filter.should_skip(rel))
        });

    let before = results.len();
    for entry in walker {
        if let Err(e) = ctx.check() {
            results.push(OperationResult::failed(input, e));
            return;
        }
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                results.push(add_file(resource, entry.path(), dry_run));
            }
            Ok(_) => {}
            Err(e) => {
                let name = e.path().map_or_else(|| input.to_string(), |p| p.display().to_string());
                results.push(OperationResult::failed(name, e));
            }
        }
    }

    if results.len() == before {
        log::info!("{input}: no files to add");
    }
}

fn add_file(resource: &DotfileResource, path: &Path, dry_run: bool) -> OperationResult {
    let target = path.strip_prefix(resource.home()).unwrap_or(path);
    let name = target.display().to_string();
    let source_rel = paths::target_to_source(target);
    let source = resource.config_dir().join(&source_rel);

    let template = template_path(&source);
    if template.exists() {
        return OperationResult::failed(
            &name,
            format!("already managed as template {}", template.display()),
        );
    }

    let already_managed = source.is_file();
    let status = match (already_managed, dry_run) {
        (false, false) => OperationStatus::Added,
        (false, true) => OperationStatus::WouldAdd,
        (true, false) => OperationStatus::Updated,
        (true, true) => OperationStatus::WouldUpdate,
    };

    let mut result = OperationResult::new(&name, status)
        .with_files_processed(1)
        .with_metadata(keys::SOURCE, source_rel.display().to_string())
        .with_metadata(keys::DESTINATION, path.display().to_string());
    result.already_managed = already_managed;

    if !dry_run {
        if let Err(e) = fileops::copy_file(path, &source) {
            return OperationResult::failed(&name, format!("{e:#}")).with_files_processed(1);
        }
        log::debug!("Copied {} -> {}", path.display(), source.display());
    }
    result
}

/// Delete sources from the config directory. Deployed files stay in place.
pub fn remove(
    ctx: &Context,
    resource: &DotfileResource,
    inputs: &[String],
    cwd: &Path,
    dry_run: bool,
) -> Vec<OperationResult> {
    inputs
        .iter()
        .map(|input| {
            ctx.check()
                .map_err(anyhow::Error::from)
                .and_then(|()| remove_one(resource, input, cwd, dry_run))
                .unwrap_or_else(|e| OperationResult::failed(input, format!("{e:#}")))
        })
        .collect()
}

fn remove_one(
    resource: &DotfileResource,
    input: &str,
    cwd: &Path,
    dry_run: bool,
) -> Result<OperationResult> {
    let path = resolve_dotfile(resource, input, cwd)?;
    let target = path.strip_prefix(resource.home()).unwrap_or(&path);
    let name = target.display().to_string();
    let plain = resource.config_dir().join(paths::target_to_source(target));

    let Some(source) = [plain.clone(), template_path(&plain)]
        .into_iter()
        .find(|p| p.exists())
    else {
        let mut result = OperationResult::new(&name, OperationStatus::Skipped);
        result.error = Some(format!("'{input}' is not managed"));
        return Ok(result);
    };
    let source_rel = source
        .strip_prefix(resource.config_dir())
        .unwrap_or(&source)
        .display()
        .to_string();

    let status = if dry_run {
        OperationStatus::WouldRemove
    } else {
        if source.is_dir() {
            fs::remove_dir_all(&source)?;
        } else {
            fs::remove_file(&source)?;
        }
        prune_empty_parents(&source, resource.config_dir());
        log::debug!("Removed {}", source.display());
        OperationStatus::Removed
    };

    Ok(OperationResult::new(name, status)
        .with_metadata(keys::SOURCE, source_rel)
        .with_metadata(keys::DESTINATION, path.display().to_string()))
}

/// Resolve user input to an absolute dotfile path under home
fn resolve_dotfile(resource: &DotfileResource, input: &str, cwd: &Path) -> Result<PathBuf> {
    let path = paths::resolve_in_home(input, resource.home(), cwd)?;
    let config_dir = paths::normalize(resource.config_dir());
    if path.starts_with(&config_dir) {
        bail!("{} is inside the config directory", path.display());
    }

    let first = path
        .strip_prefix(resource.home())
        .ok()
        .and_then(|rel| rel.components().next())
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default();
    if !first.starts_with('.') {
        bail!("{} is not a dotfile (first component must start with '.')", path.display());
    }
    Ok(path)
}

fn template_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(TEMPLATE_SUFFIX);
    PathBuf::from(name)
}

/// Remove now-empty directories between `path` and `root`
fn prune_empty_parents(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    struct Sandbox {
        _root: TempDir,
        config_dir: PathBuf,
        home: PathBuf,
    }

    fn sandbox() -> Sandbox {
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("dots");
        let home = root.path().join("home");
        fs::create_dir_all(&config_dir).unwrap();
        fs::create_dir_all(&home).unwrap();
        Sandbox {
            _root: root,
            config_dir,
            home,
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    impl Sandbox {
        fn resource(&self) -> DotfileResource {
            DotfileResource::load(&self.config_dir, &self.home, &Config::default()).unwrap()
        }

        fn add(&self, inputs: &[&str], dry_run: bool) -> Vec<OperationResult> {
            let inputs: Vec<String> = inputs.iter().map(|s| (*s).to_string()).collect();
            add(&Context::new(), &self.resource(), &inputs, &self.home, dry_run)
        }

        fn remove(&self, inputs: &[&str], dry_run: bool) -> Vec<OperationResult> {
            let inputs: Vec<String> = inputs.iter().map(|s| (*s).to_string()).collect();
            remove(&Context::new(), &self.resource(), &inputs, &self.home, dry_run)
        }
    }

    #[test]
    fn test_add_file() {
        let sb = sandbox();
        write(&sb.home.join(".zshrc"), "export A=1\n");

        let results = sb.add(&[".zshrc"], false);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, OperationStatus::Added);
        assert_eq!(results[0].name, ".zshrc");
        assert_eq!(results[0].files_processed, 1);
        assert_eq!(fs::read_to_string(sb.config_dir.join("zshrc")).unwrap(), "export A=1\n");

        let again = sb.add(&[".zshrc"], false);
        assert_eq!(again[0].status, OperationStatus::Updated);
        assert!(again[0].already_managed);
    }

    #[test]
    fn test_add_dry_run_writes_nothing() {
        let sb = sandbox();
        write(&sb.home.join(".vimrc"), "set nu\n");
        let results = sb.add(&[".vimrc"], true);
        assert_eq!(results[0].status, OperationStatus::WouldAdd);
        assert!(!sb.config_dir.join("vimrc").exists());
    }

    #[test]
    fn test_add_directory_expands_files() {
        let sb = sandbox();
        write(&sb.home.join(".config/nvim/init.lua"), "a");
        write(&sb.home.join(".config/nvim/lua/plugins.lua"), "b");
        write(&sb.home.join(".config/nvim/.init.lua.swp"), "ignored");

        let results = sb.add(&[".config/nvim"], false);
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, [".config/nvim/init.lua", ".config/nvim/lua/plugins.lua"]);
        assert_eq!(results.iter().map(|r| r.files_processed).sum::<usize>(), 2);
        assert!(sb.config_dir.join("config/nvim/lua/plugins.lua").is_file());
        assert!(!sb.config_dir.join("config/nvim/.init.lua.swp").exists());
    }

    #[test]
    fn test_add_rejects_non_dotfiles_and_outside_paths() {
        let sb = sandbox();
        write(&sb.home.join("notes.txt"), "x");
        let results = sb.add(&["notes.txt", "/etc/hosts", ".missing"], false);
        assert!(results.iter().all(OperationResult::is_failed));
        assert!(results[0].error.as_deref().unwrap().contains("not a dotfile"));
        assert!(results[1].error.as_deref().unwrap().contains("outside"));
        assert!(results[2].error.as_deref().unwrap().contains("does not exist"));
    }

    #[test]
    fn test_add_refuses_template_managed_target() {
        let sb = sandbox();
        write(&sb.config_dir.join("gitconfig.tmpl"), "{{ email }}");
        write(&sb.home.join(".gitconfig"), "rendered");
        let results = sb.add(&[".gitconfig"], false);
        assert!(results[0].is_failed());
        assert!(!sb.config_dir.join("gitconfig").exists());
    }

    #[test]
    fn test_remove_keeps_deployed_file() {
        let sb = sandbox();
        write(&sb.config_dir.join("config/git/config"), "x");
        write(&sb.home.join(".config/git/config"), "x");

        let dry = sb.remove(&[".config/git/config"], true);
        assert_eq!(dry[0].status, OperationStatus::WouldRemove);
        assert!(sb.config_dir.join("config/git/config").exists());

        let results = sb.remove(&[".config/git/config"], false);
        assert_eq!(results[0].status, OperationStatus::Removed);
        assert!(!sb.config_dir.join("config").exists());
        assert!(sb.home.join(".config/git/config").exists());
        assert!(sb.config_dir.exists());
    }

    #[test]
    fn test_remove_template_source() {
        let sb = sandbox();
        write(&sb.config_dir.join("gitconfig.tmpl"), "x");
        let results = sb.remove(&[".gitconfig"], false);
        assert_eq!(results[0].status, OperationStatus::Removed);
        assert_eq!(results[0].metadata.get(keys::SOURCE).unwrap(), "gitconfig.tmpl");
        assert!(!sb.config_dir.join("gitconfig.tmpl").exists());
    }

    #[test]
    fn test_remove_unmanaged_is_skipped() {
        let sb = sandbox();
        let results = sb.remove(&[".bashrc"], false);
        assert_eq!(results[0].status, OperationStatus::Skipped);
        assert!(results[0].error.is_some());
    }

    #[test]
    fn test_cancelled_context_fails_every_input() {
        let sb = sandbox();
        write(&sb.home.join(".zshrc"), "x");
        let ctx = Context::new();
        ctx.cancel();
        let results = add(&ctx, &sb.resource(), &[".zshrc".to_string()], &sb.home, false);
        assert!(results[0].is_failed());
        assert!(!sb.config_dir.join("zshrc").exists());
    }
}
