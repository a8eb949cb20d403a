//! Dotfile management
//!
//! Sources live in the config directory without their leading dot and are
//! deployed by copy (never symlink) into home. `.tmpl` sources are rendered
//! on deploy. See [`crate::paths`] for the name mapping.

pub mod drift;
pub mod fileops;
pub mod filter;
pub mod ops;
pub mod resource;
pub mod scanner;
pub mod template;

pub use resource::{DotfileResource, RESOURCE_ID};
