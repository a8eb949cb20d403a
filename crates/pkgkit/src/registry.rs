//! Lookup of package managers by name.

use crate::cache::AvailabilityCache;
use crate::error::{Error, Result};
use crate::manager::PackageManager;
use crate::managers::{Cargo, Gem, GoInstall, Homebrew, Npm, Pip};
use crate::runner::{CommandRunner, SystemRunner};
use reconcile::Context;
use std::sync::Arc;

/// Canonical names of every supported manager, in display order
pub const KNOWN_MANAGERS: &[&str] = &[
    Homebrew::NAME,
    Npm::NAME,
    Cargo::NAME,
    Pip::NAME,
    Gem::NAME,
    GoInstall::NAME,
];

/// Resolve aliases (`homebrew` -> `brew`) to a canonical manager name
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let name = name.trim();
    if name.eq_ignore_ascii_case("homebrew") {
        return Some(Homebrew::NAME);
    }
    KNOWN_MANAGERS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(name))
}

/// Constructs managers that share one command runner
#[derive(Clone)]
pub struct Registry {
    runner: Arc<dyn CommandRunner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub fn names(&self) -> &'static [&'static str] {
        KNOWN_MANAGERS
    }

    pub fn is_known(&self, name: &str) -> bool {
        canonical_name(name).is_some()
    }

    /// Manager by name or alias
    pub fn get(&self, name: &str) -> Result<Arc<dyn PackageManager>> {
        let runner = Arc::clone(&self.runner);
        let manager: Arc<dyn PackageManager> = match canonical_name(name) {
            Some(Homebrew::NAME) => Arc::new(Homebrew::with_runner(runner)),
            Some(Npm::NAME) => Arc::new(Npm::with_runner(runner)),
            Some(Cargo::NAME) => Arc::new(Cargo::with_runner(runner)),
            Some(Pip::NAME) => Arc::new(Pip::with_runner(runner)),
            Some(Gem::NAME) => Arc::new(Gem::with_runner(runner)),
            Some(GoInstall::NAME) => Arc::new(GoInstall::with_runner(runner)),
            _ => {
                return Err(Error::UnknownManager {
                    name: name.to_string(),
                    known: KNOWN_MANAGERS.join(", "),
                });
            }
        };
        Ok(manager)
    }

    /// Every supported manager, available or not
    pub fn all(&self) -> Vec<Arc<dyn PackageManager>> {
        KNOWN_MANAGERS
            .iter()
            .filter_map(|name| self.get(name).ok())
            .collect()
    }

    /// Managers that are installed and functional.
    ///
    /// Probe failures other than cancellation count as unavailable.
    pub fn available(
        &self,
        ctx: &Context,
        cache: &AvailabilityCache,
    ) -> Result<Vec<Arc<dyn PackageManager>>> {
        let mut available = Vec::new();
        for manager in self.all() {
            match cache.check(manager.as_ref(), ctx) {
                Ok(true) => available.push(manager),
                Ok(false) => {}
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => log::debug!("Skipping {}: {}", manager.name(), e),
            }
        }
        Ok(available)
    }
}
