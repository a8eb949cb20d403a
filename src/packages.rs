//! The packages [`Resource`]: the lock as desired state, installed packages
//! of every available manager as actual state
//!
//! Items are keyed `manager:name`, so the same package name under two
//! managers is two items. The lock stores the spec the user installed
//! (`golang.org/x/tools/gopls@latest`), while items are named the way the
//! manager lists them (`gopls`); the spec travels in the item's `source`
//! metadata so a missing package can be reinstalled from it.

use anyhow::{Result, anyhow, bail};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pkgkit::{AvailabilityCache, ErrorCategory, PackageManager, Registry, RetryPolicy, with_retry};
use reconcile::{
    Context, DOMAIN_PACKAGE, Item, ItemState, Metadata, OperationResult, OperationStatus, Resource,
    keys,
};

use crate::config::Config;
use crate::lock::Lock;

/// Resource id used in reports
pub const RESOURCE_ID: &str = "packages";

pub const TYPE_PACKAGE: &str = "package";

/// Upper bound on managers scanned at the same time
const MAX_PARALLEL_SCANS: usize = 4;

// ============================================================================
// Package references
// ============================================================================

/// A package name bound to the manager that handles it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub manager: String,
    pub name: String,
}

impl PackageRef {
    /// Parse `name` or `manager:name`.
    ///
    /// An explicit prefix wins over `fallback_manager`. Both are reduced to
    /// the canonical manager name, so `homebrew:jq` is `brew:jq`.
    pub fn parse(input: &str, fallback_manager: &str) -> Result<Self> {
        let input = input.trim();
        let (manager, name) = match input.split_once(':') {
            Some((prefix, name)) => (prefix, name),
            None => (fallback_manager, input),
        };

        if name.is_empty() {
            bail!("invalid package '{input}': name is empty");
        }
        let Some(manager) = pkgkit::canonical_name(manager) else {
            bail!(
                "invalid package '{input}': unknown package manager '{manager}' (known: {})",
                pkgkit::KNOWN_MANAGERS.join(", ")
            );
        };

        Ok(Self {
            manager: manager.to_string(),
            name: name.to_string(),
        })
    }

    /// The name without a `manager:` prefix
    pub fn bare_name(input: &str) -> &str {
        input.trim().split_once(':').map_or(input.trim(), |(_, name)| name)
    }
}

impl std::fmt::Display for PackageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.manager, self.name)
    }
}

// ============================================================================
// Resource
// ============================================================================

pub struct PackageResource {
    config_dir: PathBuf,
    lock: Mutex<Lock>,
    managers: Vec<Arc<dyn PackageManager>>,
    cache: Arc<AvailabilityCache>,
    package_timeout: Duration,
    retry: RetryPolicy,
    desired: Vec<Item>,
}

impl std::fmt::Debug for PackageResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let managers: Vec<_> = self.managers.iter().map(|m| m.name()).collect();
        f.debug_struct("PackageResource")
            .field("config_dir", &self.config_dir)
            .field("managers", &managers)
            .field("package_timeout", &self.package_timeout)
            .field("desired", &self.desired.len())
            .finish_non_exhaustive()
    }
}

impl PackageResource {
    pub fn new(
        config_dir: &Path,
        lock: Lock,
        managers: Vec<Arc<dyn PackageManager>>,
        cache: Arc<AvailabilityCache>,
        package_timeout: Duration,
    ) -> Self {
        let desired = desired_items(&lock, &managers);
        Self {
            config_dir: config_dir.to_path_buf(),
            lock: Mutex::new(lock),
            managers,
            cache,
            package_timeout,
            retry: RetryPolicy::default(),
            desired,
        }
    }

    /// Load the lock from `config_dir` and wire every known manager, or
    /// only `only` when given.
    pub fn load(
        config_dir: &Path,
        registry: &Registry,
        cache: Arc<AvailabilityCache>,
        config: &Config,
        only: Option<&str>,
    ) -> Result<Self> {
        let lock = Lock::load(config_dir)?;
        if lock.is_empty() {
            log::debug!("No packages recorded in {}", Lock::path(config_dir).display());
        } else {
            log::debug!("Lock records {} package(s): {}", lock.len(), lock.all_packages().join(", "));
        }
        let managers = match only {
            Some(name) => vec![registry.get(name)?],
            None => registry.all(),
        };
        Ok(Self::new(config_dir, lock, managers, cache, config.package_timeout())
            .with_retry_policy(config.retry_policy()))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Snapshot of the lock as last loaded or written
    pub fn lock(&self) -> Lock {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn manager(&self, name: &str) -> Option<&Arc<dyn PackageManager>> {
        let canonical = pkgkit::canonical_name(name)?;
        self.managers.iter().find(|m| m.name() == canonical)
    }

    /// First manager whose lock entry holds `name`
    pub fn locked_manager(&self, name: &str) -> Option<String> {
        let lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        lock.managers()
            .into_iter()
            .find(|manager| lock.has_package(manager, name))
    }

    /// Apply `update` to the lock and save it when it reports a change
    fn update_lock<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut Lock) -> bool,
    {
        let mut lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if update(&mut lock) {
            lock.save(&self.config_dir)?;
        }
        Ok(())
    }

    /// Run one manager call under the package timeout, retrying transient
    /// failures
    fn run_with_retry<F>(&self, ctx: &Context, action: &str, package: &str, mut call: F) -> pkgkit::Result<()>
    where
        F: FnMut(&Context) -> pkgkit::Result<()>,
    {
        with_retry(
            ctx,
            &self.retry,
            |attempt, err, delay| {
                log::warn!(
                    "{action} {package} failed (attempt {attempt}): {err}; retrying in {}s",
                    delay.as_secs()
                );
            },
            || call(&ctx.with_timeout(self.package_timeout)),
        )
    }

    /// Installed packages of every manager, scanned in parallel.
    ///
    /// Each manager's outcome is kept apart so one failing manager does not
    /// hide the others. Unavailable managers report an empty list.
    pub fn scan_by_manager(&self, ctx: &Context) -> reconcile::Result<Vec<(String, reconcile::Result<Vec<Item>>)>> {
        ctx.check()?;
        if self.managers.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.managers.len().min(MAX_PARALLEL_SCANS))
            .build()
            .map_err(std::io::Error::other)?;

        Ok(pool.install(|| {
            self.managers
                .par_iter()
                .map(|manager| (manager.name().to_string(), self.scan_manager(ctx, manager.as_ref())))
                .collect()
        }))
    }

    /// Desired items recorded for `manager`
    pub fn desired_for(&self, manager: &str) -> Vec<Item> {
        self.desired
            .iter()
            .filter(|item| item.manager.as_deref() == Some(manager))
            .cloned()
            .collect()
    }

    fn scan_manager(&self, ctx: &Context, manager: &dyn PackageManager) -> reconcile::Result<Vec<Item>> {
        let available = self
            .cache
            .check(manager, ctx)
            .map_err(|e| scan_error(manager.name(), e))?;
        if !available {
            log::debug!("Skipping {}: not available", manager.name());
            return Ok(Vec::new());
        }

        let installed = manager
            .list_installed(&ctx.with_timeout(self.package_timeout))
            .map_err(|e| scan_error(manager.name(), e))?;
        log::debug!("{}: {} installed", manager.name(), installed.len());

        Ok(installed
            .into_iter()
            .map(|name| {
                Item::new(name, DOMAIN_PACKAGE)
                    .with_type(TYPE_PACKAGE)
                    .with_manager(manager.name())
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // install / uninstall
    // ------------------------------------------------------------------------

    /// Install packages one by one and record each success in the lock.
    ///
    /// Packages already in the lock are reported `already-managed` without
    /// calling the manager.
    pub fn install(&self, ctx: &Context, packages: &[PackageRef], dry_run: bool) -> Vec<OperationResult> {
        packages
            .iter()
            .map(|package| {
                self.install_one(ctx, package, dry_run)
                    .with_manager(Some(package.manager.clone()))
            })
            .collect()
    }

    fn install_one(&self, ctx: &Context, package: &PackageRef, dry_run: bool) -> OperationResult {
        let name = &package.name;
        if self.lock().has_package(&package.manager, name) {
            let mut result = OperationResult::new(name, OperationStatus::AlreadyManaged);
            result.already_managed = true;
            return result;
        }
        if dry_run {
            return OperationResult::new(name, OperationStatus::WouldAdd);
        }

        let manager = match self.ready_manager(ctx, &package.manager) {
            Ok(manager) => manager,
            Err(message) => return OperationResult::failed(name, message),
        };

        log::info!("Installing {package}");
        if let Err(e) = self.run_with_retry(ctx, "install", name, |ctx| manager.install(ctx, name)) {
            return OperationResult::failed(name, describe_failure(&e));
        }
        if let Err(e) = self.update_lock(|lock| lock.add_package(&package.manager, name)) {
            return OperationResult::failed(name, format!("installed, but not recorded in the lock: {e:#}"));
        }
        OperationResult::new(name, OperationStatus::Added)
    }

    /// Uninstall packages and drop them from the lock.
    ///
    /// A managed package whose uninstall fails is still dropped from the
    /// lock and reported `removed` with the failure attached, so the lock
    /// stops asking for it.
    pub fn uninstall(&self, ctx: &Context, packages: &[PackageRef], dry_run: bool) -> Vec<OperationResult> {
        packages
            .iter()
            .map(|package| {
                self.uninstall_one(ctx, package, dry_run)
                    .with_manager(Some(package.manager.clone()))
            })
            .collect()
    }

    fn uninstall_one(&self, ctx: &Context, package: &PackageRef, dry_run: bool) -> OperationResult {
        let name = &package.name;
        let managed = self.lock().has_package(&package.manager, name);
        if dry_run {
            let mut result = OperationResult::new(name, OperationStatus::WouldRemove);
            result.already_managed = managed;
            return result;
        }

        log::info!("Uninstalling {package}");
        let outcome = self.ready_manager(ctx, &package.manager).and_then(|manager| {
            self.run_with_retry(ctx, "uninstall", name, |ctx| manager.uninstall(ctx, name))
                .map_err(|e| describe_failure(&e))
        });

        let mut result = match outcome {
            Ok(()) => OperationResult::new(name, OperationStatus::Removed),
            Err(message) if managed && ctx.check().is_ok() => {
                let mut result = OperationResult::new(name, OperationStatus::Removed);
                result.error = Some(format!("removed from the lock, but uninstall failed: {message}"));
                result
            }
            Err(message) => return OperationResult::failed(name, message),
        };

        if managed && let Err(e) = self.update_lock(|lock| lock.remove_package(&package.manager, name)) {
            return OperationResult::failed(name, format!("could not update the lock: {e:#}"));
        }
        result.already_managed = managed;
        result
    }

    /// The named manager, provided it is wired and available
    fn ready_manager(&self, ctx: &Context, name: &str) -> std::result::Result<&Arc<dyn PackageManager>, String> {
        let Some(manager) = self.manager(name) else {
            return Err(format!("unknown package manager '{name}'"));
        };
        match self.cache.check(manager.as_ref(), ctx) {
            Ok(true) => Ok(manager),
            Ok(false) => Err(format!(
                "package manager '{name}' is not available. Hint: {}",
                ErrorCategory::ManagerNotFound.advice()
            )),
            Err(e) => Err(describe_failure(&e)),
        }
    }

    // ------------------------------------------------------------------------
    // search / info
    // ------------------------------------------------------------------------

    /// Search every available manager that can search, in parallel.
    ///
    /// Managers that are unavailable or cannot search are left out; each
    /// remaining manager's outcome is kept apart.
    pub fn search(&self, ctx: &Context, query: &str) -> reconcile::Result<Vec<(String, pkgkit::Result<Vec<String>>)>> {
        ctx.check()?;
        let searchable: Vec<&dyn PackageManager> = self
            .managers
            .iter()
            .map(|manager| &**manager)
            .filter(|manager| manager.supports_search())
            .collect();
        if searchable.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(searchable.len().min(MAX_PARALLEL_SCANS))
            .build()
            .map_err(std::io::Error::other)?;

        Ok(pool.install(|| {
            searchable
                .par_iter()
                .filter_map(|&manager| {
                    match self.cache.check(manager, ctx) {
                        Ok(true) => {}
                        Ok(false) => {
                            log::debug!("Skipping {}: not available", manager.name());
                            return None;
                        }
                        Err(e) => return Some((manager.name().to_string(), Err(e))),
                    }
                    let hits = manager.search(&ctx.with_timeout(self.package_timeout), query);
                    Some((manager.name().to_string(), hits))
                })
                .collect()
        }))
    }

    /// First available manager that reports `name` installed
    pub fn installed_manager(&self, ctx: &Context, name: &str) -> Option<String> {
        self.managers.iter().find_map(|manager| {
            if !matches!(self.cache.check(manager.as_ref(), ctx), Ok(true)) {
                return None;
            }
            match manager.is_installed(&ctx.with_timeout(self.package_timeout), name) {
                Ok(true) => Some(manager.name().to_string()),
                Ok(false) => None,
                Err(e) => {
                    log::debug!("Could not check {name} with {}: {e}", manager.name());
                    None
                }
            }
        })
    }

    /// Describe `package` through its manager
    pub fn info(&self, ctx: &Context, package: &PackageRef) -> Result<pkgkit::PackageInfo> {
        let manager = self.ready_manager(ctx, &package.manager).map_err(|message| anyhow!(message))?;
        manager
            .info(&ctx.with_timeout(self.package_timeout), &package.name)
            .map_err(|e| anyhow!(describe_failure(&e)))
    }
}

impl Resource for PackageResource {
    fn id(&self) -> String {
        RESOURCE_ID.to_string()
    }

    fn desired(&self) -> &[Item] {
        &self.desired
    }

    fn set_desired(&mut self, items: Vec<Item>) {
        self.desired = items;
    }

    fn actual(&self, ctx: &Context) -> reconcile::Result<Vec<Item>> {
        let mut items = Vec::new();
        for (_, scan) in self.scan_by_manager(ctx)? {
            items.extend(scan?);
        }
        Ok(items)
    }

    fn apply(&self, ctx: &Context, item: &Item) -> reconcile::Result<()> {
        match item.state {
            ItemState::Managed | ItemState::Degraded => Ok(()),
            ItemState::Missing => {
                let manager = self.apply_manager(item)?;
                let spec = item.metadata.get_str(keys::SOURCE).unwrap_or(&item.name);
                self.run_with_retry(ctx, "install", spec, |ctx| manager.install(ctx, spec))
                    .map_err(|e| apply_error(item, e))?;
                self.update_lock(|lock| lock.add_package(manager.name(), spec))
                    .map_err(|e| reconcile::Error::apply(DOMAIN_PACKAGE, &item.name, e))
            }
            ItemState::Untracked => {
                let manager = self.apply_manager(item)?;
                self.run_with_retry(ctx, "uninstall", &item.name, |ctx| manager.uninstall(ctx, &item.name))
                    .map_err(|e| apply_error(item, e))
            }
        }
    }
}

impl PackageResource {
    fn apply_manager(&self, item: &Item) -> reconcile::Result<&Arc<dyn PackageManager>> {
        let name = item.manager.as_deref().ok_or_else(|| reconcile::Error::MissingMetadata {
            name: item.name.clone(),
            key: "manager".to_string(),
        })?;
        self.manager(name).ok_or_else(|| {
            reconcile::Error::apply(
                DOMAIN_PACKAGE,
                &item.name,
                anyhow!("unknown package manager '{name}'"),
            )
        })
    }
}

/// Desired items for every locked package of a wired manager
fn desired_items(lock: &Lock, managers: &[Arc<dyn PackageManager>]) -> Vec<Item> {
    let mut items = Vec::new();
    for locked in lock.managers() {
        let Some(manager) = pkgkit::canonical_name(&locked)
            .and_then(|canonical| managers.iter().find(|m| m.name() == canonical))
        else {
            if pkgkit::canonical_name(&locked).is_none() {
                log::warn!("Ignoring lock entries for unknown package manager '{locked}'");
            }
            continue;
        };

        for spec in lock.packages(&locked) {
            let mut metadata = Metadata::new();
            metadata.insert(keys::SOURCE, spec.as_str());
            items.push(
                Item::new(manager.installed_name(&spec), DOMAIN_PACKAGE)
                    .with_type(TYPE_PACKAGE)
                    .with_manager(manager.name())
                    .with_metadata(metadata),
            );
        }
    }
    items
}

fn scan_error(manager: &str, err: pkgkit::Error) -> reconcile::Error {
    match err {
        pkgkit::Error::Cancelled => reconcile::Error::Cancelled,
        pkgkit::Error::DeadlineExceeded => reconcile::Error::DeadlineExceeded,
        other => reconcile::Error::scan(format!("{RESOURCE_ID} ({manager})"), other),
    }
}

fn apply_error(item: &Item, err: pkgkit::Error) -> reconcile::Error {
    match err {
        pkgkit::Error::Cancelled => reconcile::Error::Cancelled,
        pkgkit::Error::DeadlineExceeded => reconcile::Error::DeadlineExceeded,
        other => reconcile::Error::apply(DOMAIN_PACKAGE, &item.name, describe_failure(&other)),
    }
}

/// Error message with the category's advice for anything classified
pub fn describe_failure(err: &pkgkit::Error) -> String {
    match err.category() {
        ErrorCategory::Other => err.to_string(),
        category => format!("{err}. Hint: {}", category.advice()),
    }
}
