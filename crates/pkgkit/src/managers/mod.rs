//! Adapters for the supported package managers.

pub mod cargo;
pub mod gem;
pub mod go;
pub mod homebrew;
pub mod npm;
pub mod pip;

pub use cargo::Cargo;
pub use gem::Gem;
pub use go::GoInstall;
pub use homebrew::Homebrew;
pub use npm::Npm;
pub use pip::Pip;
