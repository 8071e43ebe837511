//! Release sources
//!
//! An [`ArtifactSource`] lists the releases of one repository and downloads
//! individual assets. [`GithubSource`] talks to the GitHub REST API; tests
//! plug in their own in-memory implementations.

mod github;

pub use github::{GithubSource, GithubSourceBuilder};

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// A tagged publication with zero or more assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag: String,
    pub title: String,
    pub notes: String,
    pub assets: Vec<Asset>,
}

/// Download progress callback, called with a percentage in `0.0..=100.0`
pub type DownloadProgress<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Where plugin releases come from
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// All releases of the repository, newest first as the source orders them
    async fn list_releases(&self) -> Result<Vec<Release>>;

    /// Stream the asset at `url` into `dest`, replacing any existing file
    async fn download(&self, url: &str, dest: &Path, progress: DownloadProgress<'_>)
    -> Result<()>;
}
