//! skinned-export library
//!
//! Command implementations behind the `skinned-export` binary, usable from other pipeline tools.

pub mod animation;
pub mod config;
pub mod inspect;
pub mod mesh;
pub mod skeleton;

pub use config::{Config, ConfigError};

// Re-export the formats crate so callers need a single dependency
pub use skinned_common;
