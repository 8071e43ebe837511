//! Error types for Plugdock

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using Plugdock's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`], used by callers that branch on the
/// failure class rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyInstalled,
    NotInstalled,
    Transport,
    ConfigIo,
    Filesystem,
    PartialState,
    InvalidInput,
}

/// Plugdock error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Registry errors (E001-E099)
    #[error("Plugin '{0}' not found in the release source. Run `plugdock list` to see available plugins.")]
    NotFound(String),

    #[error("Plugin '{0}' is already installed. Use `plugdock update --name {0}` instead.")]
    AlreadyInstalled(String),

    #[error("Plugin '{0}' is not installed. Run `plugdock status` to see installed plugins.")]
    NotInstalled(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    Network(#[from] reqwest::Error),

    #[error("Release source error: {0}")]
    Transport(String),

    #[error("Checksum mismatch for '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    // Config errors (E200-E299)
    #[error("Configuration file error ({}): {reason}", path.display())]
    ConfigIo { path: PathBuf, reason: String },

    // Filesystem errors (E300-E399)
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    // Inconsistent state (E400-E499)
    #[error(transparent)]
    PartialState(#[from] PartialState),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Conditions where a side effect already happened but the matching
/// bookkeeping did not. None of these are rolled back automatically.
#[derive(Error, Debug)]
pub enum PartialState {
    #[error(
        "Plugin '{name}' was installed to {} but the registry could not be updated: {reason}",
        install_path.display()
    )]
    InstalledRegistryPending {
        name: String,
        install_path: PathBuf,
        reason: String,
    },

    #[error("Files for plugin '{name}' were removed but the registry still lists it: {reason}")]
    FilesRemovedRegistryStale { name: String, reason: String },

    #[error(
        "Registry was updated in memory but could not be saved to {}: {reason}",
        path.display()
    )]
    RegistryPersistFailed { path: PathBuf, reason: String },
}

impl Error {
    /// Wrap an IO error with the path it happened at
    pub fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a config error for the settings file at `path`
    pub fn config_io(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::ConfigIo {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyInstalled(_) => ErrorKind::AlreadyInstalled,
            Self::NotInstalled(_) => ErrorKind::NotInstalled,
            Self::Network(_) | Self::Transport(_) | Self::ChecksumMismatch { .. } => {
                ErrorKind::Transport
            }
            Self::ConfigIo { .. } => ErrorKind::ConfigIo,
            Self::Filesystem { .. } | Self::Archive(_) => ErrorKind::Filesystem,
            Self::PartialState(_) => ErrorKind::PartialState,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E001",
            Self::AlreadyInstalled(_) => "E002",
            Self::NotInstalled(_) => "E003",
            Self::Network(_) => "E100",
            Self::Transport(_) => "E101",
            Self::ChecksumMismatch { .. } => "E102",
            Self::ConfigIo { .. } => "E200",
            Self::Filesystem { .. } => "E300",
            Self::Archive(_) => "E301",
            Self::PartialState(PartialState::InstalledRegistryPending { .. }) => "E400",
            Self::PartialState(PartialState::FilesRemovedRegistryStale { .. }) => "E401",
            Self::PartialState(PartialState::RegistryPersistFailed { .. }) => "E402",
            Self::InvalidInput(_) => "E800",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NotFound(_) => Some("plugdock list".to_string()),
            Self::AlreadyInstalled(name) => Some(format!("plugdock update --name {}", name)),
            Self::NotInstalled(_) => Some("plugdock status".to_string()),
            Self::Network(_) => Some("Check internet connection".to_string()),
            Self::ConfigIo { path, .. } => Some(format!("Inspect or delete {}", path.display())),
            Self::PartialState(PartialState::InstalledRegistryPending { install_path, .. }) => {
                Some(format!(
                    "Remove {} manually or retry once the settings file is writable",
                    install_path.display()
                ))
            }
            Self::PartialState(PartialState::FilesRemovedRegistryStale { name, .. }) => {
                Some(format!("plugdock remove --name {}", name))
            }
            _ => None,
        }
    }
}
