//! # pkgkit
//!
//! Uniform adapters over system package managers.
//!
//! Each supported manager (Homebrew, npm, cargo, pip, gem, `go install`)
//! implements [`PackageManager`] by driving its CLI through a
//! [`CommandRunner`]. Failures are classified from the manager's output into
//! an [`ErrorCategory`], so "already installed" and "not installed" can be
//! treated as success and network hiccups can be retried.
//!
//! ## Example
//!
//! ```no_run
//! use pkgkit::{AvailabilityCache, Registry};
//! use reconcile::Context;
//!
//! let registry = Registry::new();
//! let cache = AvailabilityCache::default();
//! let ctx = Context::new();
//!
//! for manager in registry.available(&ctx, &cache)? {
//!     let installed = manager.list_installed(&ctx)?;
//!     println!("{}: {} packages", manager.name(), installed.len());
//! }
//! # Ok::<(), pkgkit::Error>(())
//! ```

pub mod cache;
pub mod error;
pub mod manager;
pub mod managers;
pub mod registry;
pub mod retry;
pub mod runner;

pub use cache::{AvailabilityCache, DEFAULT_TTL};
pub use error::{Error, ErrorCategory, Result};
pub use manager::{PackageInfo, PackageManager};
pub use registry::{KNOWN_MANAGERS, Registry, canonical_name};
pub use retry::{RetryPolicy, with_retry};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
