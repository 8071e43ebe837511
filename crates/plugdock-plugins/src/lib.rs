//! Plugdock Plugin Lifecycle
//!
//! Installs, updates, and removes plugins published as release assets:
//! - Catalog building and natural version ordering
//! - Download verification (SHA-256)
//! - Placement on disk (zip extraction or single-file copy) and backups
//! - The [`PluginCoordinator`] that sequences it all against the registry

pub mod catalog;
pub mod checksum;
pub mod coordinator;
pub mod placement;
pub mod progress;

pub use coordinator::{Outcome, OperationReport, PluginCoordinator};
pub use progress::{NoProgress, ProgressReporter};
