//! The dotfiles [`Resource`]: config tree as desired state, home as actual

use anyhow::{Context as _, Result, bail};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reconcile::{Context, DOMAIN_DOTFILE, DriftComparator, Item, ItemState, Metadata, Resource, keys};

use super::drift::HashComparator;
use super::fileops;
use super::filter::Filter;
use super::scanner::{self, SourceEntry};
use super::template::TemplateRenderer;
use crate::config::Config;
use crate::paths;

/// Resource id used in reports
pub const RESOURCE_ID: &str = "dotfiles";

pub const TYPE_FILE: &str = "file";
pub const TYPE_DIRECTORY: &str = "directory";

pub struct DotfileResource {
    config_dir: PathBuf,
    home: PathBuf,
    /// Ignore rules for the config tree
    source_filter: Filter,
    /// Ignore rules for home, also hiding the config dir when it lives there
    home_filter: Filter,
    expand_directories: Vec<String>,
    renderer: Arc<TemplateRenderer>,
    desired: Vec<Item>,
}

impl std::fmt::Debug for DotfileResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DotfileResource")
            .field("config_dir", &self.config_dir)
            .field("home", &self.home)
            .field("desired", &self.desired.len())
            .finish_non_exhaustive()
    }
}

impl DotfileResource {
    /// Build the resource and load its desired items from the config tree
    pub fn load(config_dir: &Path, home: &Path, config: &Config) -> Result<Self> {
        let source_filter = Filter::new(&config.ignore_patterns)?;
        let home_filter = source_filter.clone().excluding_config_dir(config_dir, home);
        let renderer = Arc::new(TemplateRenderer::load(config_dir, home)?);

        let mut resource = Self {
            config_dir: config_dir.to_path_buf(),
            home: home.to_path_buf(),
            source_filter,
            home_filter,
            expand_directories: config.expand_directories.clone(),
            renderer,
            desired: Vec::new(),
        };
        resource.desired = resource.desired_items()?;
        Ok(resource)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn home_filter(&self) -> &Filter {
        &self.home_filter
    }

    /// Scan the config tree into desired items.
    ///
    /// Fails when two sources deploy to the same target (`gitconfig` next to
    /// `gitconfig.tmpl`).
    pub fn desired_items(&self) -> Result<Vec<Item>> {
        let sources = scanner::scan_config_dir(&self.config_dir, &self.source_filter);

        let mut seen: HashMap<&Path, &Path> = HashMap::with_capacity(sources.len());
        for entry in &sources {
            if let Some(other) = seen.insert(entry.target.as_path(), entry.relative.as_path()) {
                bail!(
                    "conflict: {} and {} both deploy to ~/{}",
                    other.display(),
                    entry.relative.display(),
                    entry.target.display()
                );
            }
        }

        Ok(sources.iter().map(|entry| self.source_item(entry)).collect())
    }

    fn source_item(&self, entry: &SourceEntry) -> Item {
        let source = self.config_dir.join(&entry.relative);
        let destination = self.home.join(&entry.target);
        let template = entry.is_template();

        let comparator: Arc<dyn DriftComparator> = if template {
            Arc::new(HashComparator::template(
                source.clone(),
                destination.clone(),
                Arc::clone(&self.renderer),
            ))
        } else {
            Arc::new(HashComparator::new(source.clone(), destination.clone()))
        };

        let mut metadata = Metadata::new();
        metadata.insert(keys::SOURCE, source.display().to_string());
        metadata.insert(keys::DESTINATION, destination.display().to_string());
        metadata.insert(keys::TEMPLATE, template);
        metadata.set_comparator(keys::DRIFT_COMPARATOR, comparator);

        Item::new(entry.target.display().to_string(), DOMAIN_DOTFILE)
            .with_type(TYPE_FILE)
            .with_path(destination)
            .with_metadata(metadata)
    }

    /// Bytes a deploy of `item` would write: the source, rendered if a template
    pub fn source_content(&self, item: &Item) -> Result<Vec<u8>> {
        let source = PathBuf::from(required(item, keys::SOURCE)?);
        if item.metadata.get_bool(keys::TEMPLATE) {
            self.renderer.render_file(&source)
        } else {
            fs::read(&source).with_context(|| format!("Failed to read {}", source.display()))
        }
    }

    /// Write the source of `item` to its destination
    fn deploy(&self, item: &Item) -> Result<()> {
        let source = PathBuf::from(required(item, keys::SOURCE)?);
        let destination = PathBuf::from(required(item, keys::DESTINATION)?);
        paths::validate_in_home(&destination, &self.home)?;

        let content = self.source_content(item)?;
        let permissions = fs::metadata(&source)
            .with_context(|| format!("Failed to stat {}", source.display()))?
            .permissions();
        fileops::write_with_permissions(&destination, &content, Some(permissions))?;
        log::debug!("Deployed {} -> {}", source.display(), destination.display());
        Ok(())
    }

    /// Back up the drifted destination, then overwrite it from the source
    fn restore(&self, item: &Item) -> Result<()> {
        let destination = PathBuf::from(required(item, keys::DESTINATION)?);
        if destination.is_file() {
            fileops::create_backup(&destination)?;
        }
        self.deploy(item)
    }
}

fn required<'a>(item: &'a Item, key: &str) -> reconcile::Result<&'a str> {
    item.metadata
        .get_str(key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| reconcile::Error::MissingMetadata {
            name: item.name.clone(),
            key: key.to_string(),
        })
}

impl Resource for DotfileResource {
    fn id(&self) -> String {
        RESOURCE_ID.to_string()
    }

    fn desired(&self) -> &[Item] {
        &self.desired
    }

    fn set_desired(&mut self, items: Vec<Item>) {
        self.desired = items;
    }

    /// Dotfiles found under home, plus any configured destination that
    /// exists deeper than the scan reaches.
    fn actual(&self, ctx: &Context) -> reconcile::Result<Vec<Item>> {
        let entries =
            scanner::scan_home(ctx, &self.home, &self.expand_directories, &self.home_filter)?;

        // A directory that holds managed files is represented by those files
        let managed_parents: HashSet<PathBuf> = self
            .desired
            .iter()
            .filter_map(|item| Path::new(&item.name).components().next())
            .map(|first| PathBuf::from(first.as_os_str()))
            .collect();

        let mut items = Vec::with_capacity(entries.len());
        let mut names = HashSet::with_capacity(entries.len());
        for entry in entries {
            if entry.is_dir && managed_parents.contains(&entry.relative) {
                continue;
            }
            let name = entry.relative.display().to_string();
            let path = self.home.join(&entry.relative);
            let mut metadata = Metadata::new();
            metadata.insert(keys::IS_DIRECTORY, entry.is_dir);

            names.insert(name.clone());
            items.push(
                Item::new(name, DOMAIN_DOTFILE)
                    .with_state(ItemState::Untracked)
                    .with_type(if entry.is_dir { TYPE_DIRECTORY } else { TYPE_FILE })
                    .with_path(path)
                    .with_metadata(metadata),
            );
        }

        for want in &self.desired {
            ctx.check()?;
            if names.contains(&want.name) {
                continue;
            }
            let Some(path) = want.path.as_deref() else {
                continue;
            };
            if path.is_file() && !self.home_filter.should_skip(Path::new(&want.name)) {
                items.push(
                    Item::new(want.name.clone(), DOMAIN_DOTFILE)
                        .with_state(ItemState::Untracked)
                        .with_type(TYPE_FILE)
                        .with_path(path),
                );
            }
        }

        Ok(items)
    }

    fn apply(&self, ctx: &Context, item: &Item) -> reconcile::Result<()> {
        ctx.check()?;
        let outcome = match item.state {
            ItemState::Managed => return Ok(()),
            ItemState::Missing => self.deploy(item),
            ItemState::Degraded => self.restore(item),
            ItemState::Untracked => {
                return Err(reconcile::Error::not_supported(
                    DOMAIN_DOTFILE,
                    &item.name,
                    "automatic removal of untracked dotfiles is not supported",
                ));
            }
        };
        outcome.map_err(|e| match e.downcast::<reconcile::Error>() {
            Ok(err) => err,
            Err(e) => reconcile::Error::apply(DOMAIN_DOTFILE, &item.name, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{ApplyOptions, NoProgress, apply_items, reconcile_resource};
    use tempfile::TempDir;

    struct Sandbox {
        _root: TempDir,
        config_dir: PathBuf,
        home: PathBuf,
    }

    impl Sandbox {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let config_dir = root.path().join("dots");
            let home = root.path().join("home");
            fs::create_dir_all(&config_dir).unwrap();
            fs::create_dir_all(&home).unwrap();
            Self {
                _root: root,
                config_dir,
                home,
            }
        }

        fn source(&self, rel: &str, content: &str) {
            write(&self.config_dir.join(rel), content);
        }

        fn deployed(&self, rel: &str, content: &str) {
            write(&self.home.join(rel), content);
        }

        fn resource(&self) -> DotfileResource {
            DotfileResource::load(&self.config_dir, &self.home, &Config::default()).unwrap()
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn state_of(items: &[Item], name: &str) -> Option<ItemState> {
        items.iter().find(|i| i.name == name).map(|i| i.state)
    }

    #[test]
    fn test_desired_items_carry_metadata() {
        let sb = Sandbox::new();
        sb.source("zshrc", "export A=1\n");
        sb.source("gitconfig.tmpl", "[user]\n");

        let resource = sb.resource();
        let names: Vec<_> = resource.desired().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, [".gitconfig", ".zshrc"]);

        let zshrc = &resource.desired()[1];
        assert_eq!(zshrc.domain, DOMAIN_DOTFILE);
        assert_eq!(
            zshrc.metadata.get_str(keys::SOURCE),
            Some(sb.config_dir.join("zshrc").display().to_string().as_str())
        );
        assert_eq!(zshrc.path.as_deref(), Some(sb.home.join(".zshrc").as_path()));
        assert!(!zshrc.metadata.get_bool(keys::TEMPLATE));
        assert!(resource.desired()[0].metadata.get_bool(keys::TEMPLATE));
        assert!(zshrc.metadata.contains_key(keys::DRIFT_COMPARATOR));
    }

    #[test]
    fn test_template_conflict() {
        let sb = Sandbox::new();
        sb.source("gitconfig", "a");
        sb.source("gitconfig.tmpl", "b");
        let err = DotfileResource::load(&sb.config_dir, &sb.home, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("conflict"));
    }

    #[test]
    fn test_reconcile_states() {
        let sb = Sandbox::new();
        sb.source("zshrc", "same\n");
        sb.source("vimrc", "source\n");
        sb.source("tmux.conf", "missing\n");
        sb.deployed(".zshrc", "same\n");
        sb.deployed(".vimrc", "edited\n");
        sb.deployed(".bashrc", "untracked\n");

        let resource = sb.resource();
        let items = reconcile_resource(&Context::new(), &resource).unwrap();

        assert_eq!(state_of(&items, ".zshrc"), Some(ItemState::Managed));
        assert_eq!(state_of(&items, ".vimrc"), Some(ItemState::Degraded));
        assert_eq!(state_of(&items, ".tmux.conf"), Some(ItemState::Missing));
        assert_eq!(state_of(&items, ".bashrc"), Some(ItemState::Untracked));
    }

    #[test]
    fn test_nested_destination_found_beyond_scan() {
        let sb = Sandbox::new();
        sb.source("claude/agents/reviewer.md", "x");
        sb.deployed(".claude/agents/reviewer.md", "x");

        let resource = sb.resource();
        let items = reconcile_resource(&Context::new(), &resource).unwrap();
        assert_eq!(state_of(&items, ".claude/agents/reviewer.md"), Some(ItemState::Managed));
        assert_eq!(state_of(&items, ".claude"), None);
    }

    #[test]
    fn test_apply_deploys_and_restores() {
        let sb = Sandbox::new();
        sb.source("zshrc", "new\n");
        sb.source("config/git/config", "[core]\n");
        sb.deployed(".zshrc", "old\n");

        let resource = sb.resource();
        let ctx = Context::new();
        let items = reconcile_resource(&ctx, &resource).unwrap();
        let results = apply_items(&resource, &ctx, &items, &ApplyOptions::default(), &mut NoProgress);

        assert!(results.iter().all(|r| !r.is_failed()), "{results:?}");
        assert_eq!(fs::read_to_string(sb.home.join(".zshrc")).unwrap(), "new\n");
        assert_eq!(
            fs::read_to_string(sb.home.join(".config/git/config")).unwrap(),
            "[core]\n"
        );

        let backups: Vec<_> = fs::read_dir(&sb.home)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".zshrc.backup."))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(backups[0].path()).unwrap(), "old\n");

        let again = reconcile_resource(&ctx, &resource).unwrap();
        assert_eq!(state_of(&again, ".zshrc"), Some(ItemState::Managed));
        assert_eq!(state_of(&again, ".config/git/config"), Some(ItemState::Managed));
    }

    #[test]
    fn test_restore_leaves_no_untracked_backup() {
        let sb = Sandbox::new();
        sb.source("zshrc", "new\n");
        sb.deployed(".zshrc", "old\n");

        let resource = sb.resource();
        let ctx = Context::new();
        let items = reconcile_resource(&ctx, &resource).unwrap();
        assert_eq!(state_of(&items, ".zshrc"), Some(ItemState::Degraded));
        apply_items(&resource, &ctx, &items, &ApplyOptions::default(), &mut NoProgress);

        let again = reconcile_resource(&ctx, &resource).unwrap();
        let untracked: Vec<_> = again
            .iter()
            .filter(|i| i.state == ItemState::Untracked)
            .map(|i| i.name.as_str())
            .collect();
        assert!(untracked.is_empty(), "{untracked:?}");
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_apply_renders_template() {
        let sb = Sandbox::new();
        sb.source("gitconfig.tmpl", "email = {{ email }}\n");
        write(&TemplateRenderer::local_vars_path(&sb.config_dir), "email: me@example.com\n");

        let resource = sb.resource();
        let ctx = Context::new();
        let items = reconcile_resource(&ctx, &resource).unwrap();
        let results = apply_items(&resource, &ctx, &items, &ApplyOptions::default(), &mut NoProgress);
        assert!(results.iter().all(|r| !r.is_failed()), "{results:?}");
        assert_eq!(
            fs::read_to_string(sb.home.join(".gitconfig")).unwrap(),
            "email = me@example.com\n"
        );

        let again = reconcile_resource(&ctx, &resource).unwrap();
        assert_eq!(state_of(&again, ".gitconfig"), Some(ItemState::Managed));
    }

    #[test]
    fn test_untracked_is_refused() {
        let sb = Sandbox::new();
        let resource = sb.resource();
        let item = Item::new(".bashrc", DOMAIN_DOTFILE).with_state(ItemState::Untracked);
        let err = resource.apply(&Context::new(), &item).unwrap_err();
        assert!(matches!(err, reconcile::Error::NotSupported { .. }));
    }

    #[test]
    fn test_missing_metadata() {
        let sb = Sandbox::new();
        let resource = sb.resource();
        let item = Item::new(".zshrc", DOMAIN_DOTFILE).with_state(ItemState::Missing);
        let err = resource.apply(&Context::new(), &item).unwrap_err();
        assert!(matches!(err, reconcile::Error::MissingMetadata { ref key, .. } if key == keys::SOURCE));
    }

    #[test]
    fn test_managed_is_noop() {
        let sb = Sandbox::new();
        let resource = sb.resource();
        let item = Item::new(".zshrc", DOMAIN_DOTFILE);
        assert!(resource.apply(&Context::new(), &item).is_ok());
    }

    #[test]
    fn test_config_dir_inside_home_is_hidden() {
        let root = TempDir::new().unwrap();
        let home = root.path().to_path_buf();
        let config_dir = home.join(".config/hearth");
        write(&config_dir.join("zshrc"), "x");
        write(&home.join(".config/nvim/init.lua"), "y");

        let resource = DotfileResource::load(&config_dir, &home, &Config::default()).unwrap();
        let actual = resource.actual(&Context::new()).unwrap();
        let names: Vec<_> = actual.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, [".config/nvim/init.lua"]);
    }
}
