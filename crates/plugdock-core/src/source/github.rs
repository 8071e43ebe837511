//! GitHub releases client
//!
//! Lists releases through the REST API and streams asset downloads to disk
//! with progress reporting. No retries; a failed request fails the call.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{ArtifactSource, Asset, DownloadProgress, Release};
use crate::error::{Error, Result};

/// GitHub API base URL
const GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// Time allowed to establish a connection
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle time allowed between reads; downloads have no total limit
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Releases fetched per page (GitHub maximum)
const RELEASES_PER_PAGE: u32 = 100;

const CLIENT_USER_AGENT: &str = concat!("plugdock/", env!("CARGO_PKG_VERSION"));

/// Release source backed by one GitHub repository
#[derive(Clone)]
pub struct GithubSource {
    http_client: HttpClient,
    owner: String,
    repo: String,
    token: Option<String>,
    base_url: String,
    read_timeout: Duration,
}

impl std::fmt::Debug for GithubSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubSource")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("base_url", &self.base_url)
            .field("read_timeout", &self.read_timeout)
            .field("token", &self.token.is_some())
            .finish()
    }
}

/// Builder for creating a GithubSource
#[derive(Default)]
pub struct GithubSourceBuilder {
    owner: Option<String>,
    repo: Option<String>,
    token: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl GithubSourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Set the access token; empty tokens are ignored
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set the API base URL (defaults to api.github.com)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set how long a request may go without receiving data
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<GithubSource> {
        let owner = required(self.owner, "owner")?;
        let repo = required(self.repo, "repo")?;

        let read_timeout =
            Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS));
        let http_client = HttpClient::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(read_timeout)
            .build()
            .map_err(Error::Network)?;

        Ok(GithubSource {
            http_client,
            owner,
            repo,
            token: self.token,
            read_timeout,
            base_url: self
                .base_url
                .unwrap_or_else(|| GITHUB_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("GitHub repository {} is required", what)))
}

impl GithubSource {
    pub fn builder() -> GithubSourceBuilder {
        GithubSourceBuilder::new()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn releases_url(&self, page: u32) -> String {
        format!(
            "{}/repos/{}/{}/releases?per_page={}&page={}",
            self.base_url, self.owner, self.repo, RELEASES_PER_PAGE, page
        )
    }

    fn request(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let request = self
            .http_client
            .get(url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, accept);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<GithubRelease>> {
        let url = self.releases_url(page);
        debug!(url = %url, "Fetching releases page");

        let response = self
            .request(&url, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(status, response).await;
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse releases: {}", e)))
    }

    /// Map error responses to transport errors with a useful hint
    async fn handle_error_response<T>(
        &self,
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> Result<T> {
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(Error::Transport(
                "Unauthorized: the GitHub token was rejected. Update it with `plugdock config set github_token <token>`.".to_string(),
            )),
            403 | 429 => Err(Error::Transport(format!(
                "GitHub refused the request ({}), possibly rate limited. Configure a token to raise the limit. {}",
                status, body
            ))),
            404 => Err(Error::Transport(format!(
                "Repository {}/{} or asset not found (private repositories need a token)",
                self.owner, self.repo
            ))),
            _ => Err(Error::Transport(format!("HTTP {}: {}", status, body))),
        }
    }
}

#[async_trait]
impl ArtifactSource for GithubSource {
    async fn list_releases(&self) -> Result<Vec<Release>> {
        let mut releases = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(page).await?;
            let len = batch.len();
            releases.extend(batch.into_iter().map(Release::from));
            if len < RELEASES_PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        info!(
            owner = %self.owner,
            repo = %self.repo,
            releases = releases.len(),
            "Listed releases"
        );
        Ok(releases)
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: DownloadProgress<'_>,
    ) -> Result<()> {
        debug!(url = %url, dest = %dest.display(), "Starting download");

        let response = self
            .request(url, "application/octet-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(status, response).await;
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::fs(dest, e))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        progress(0.0);

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    drop(file);
                    discard_partial(dest).await;
                    return Err(Error::Network(e));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                discard_partial(dest).await;
                return Err(Error::fs(dest, e));
            }
            downloaded += chunk.len() as u64;
            if let Some(total) = total {
                progress((downloaded as f32 / total as f32 * 100.0).min(100.0));
            }
        }

        file.flush().await.map_err(|e| Error::fs(dest, e))?;
        progress(100.0);

        info!(url = %url, bytes = downloaded, "Download complete");
        Ok(())
    }
}

async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Could not remove partial download");
    }
}

/// Release as returned by the GitHub REST API
#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: u64,
}

impl From<GithubRelease> for Release {
    fn from(release: GithubRelease) -> Self {
        Self {
            title: release.name.unwrap_or_else(|| release.tag_name.clone()),
            tag: release.tag_name,
            notes: release.body.unwrap_or_default(),
            assets: release
                .assets
                .into_iter()
                .map(|a| Asset {
                    name: a.name,
                    url: a.browser_download_url,
                    size: a.size,
                })
                .collect(),
        }
    }
}
