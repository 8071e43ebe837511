//! Plugdock Core Library
//!
//! This crate provides the pieces the plugin lifecycle is built on:
//! - Settings and installed-plugin registry persisted as JSON
//! - Release sources (GitHub releases over HTTPS)
//! - Error types shared by every Plugdock crate

pub mod config;
pub mod error;
pub mod source;

pub use error::{Error, ErrorKind, PartialState, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigStore, LauncherSettings, PluginRecord};
    pub use crate::error::{Error, ErrorKind, PartialState, Result};
    pub use crate::source::{ArtifactSource, Asset, Release};
}
