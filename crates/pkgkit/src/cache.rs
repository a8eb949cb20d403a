//! Time-bounded memo of manager availability.
//!
//! Probing a manager spawns `<binary> --version`, which is slow enough to
//! matter when several commands run in one process. The cache is an ordinary
//! value owned by the caller.

use crate::error::Result;
use crate::manager::PackageManager;
use reconcile::Context;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Default lifetime of a cached availability check
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
pub struct AvailabilityCache {
    entries: RwLock<HashMap<String, (bool, Instant)>>,
    ttl: Duration,
}

impl Default for AvailabilityCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached availability, if checked within the TTL
    pub fn get(&self, manager: &str) -> Option<bool> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(manager)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(available, _)| *available)
    }

    pub fn insert(&self, manager: &str, available: bool) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(manager.to_string(), (available, Instant::now()));
    }

    /// Cached value, or ask the manager and remember the answer.
    ///
    /// Errors are not cached.
    pub fn check(&self, manager: &dyn PackageManager, ctx: &Context) -> Result<bool> {
        if let Some(available) = self.get(manager.name()) {
            return Ok(available);
        }
        let available = manager.is_available(ctx)?;
        log::debug!("{} available: {}", manager.name(), available);
        self.insert(manager.name(), available);
        Ok(available)
    }

    pub fn invalidate(&self, manager: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(manager);
    }

    pub fn invalidate_all(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
