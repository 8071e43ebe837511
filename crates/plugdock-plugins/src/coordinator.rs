//! Plugin lifecycle coordinator
//!
//! Sequences install, update, and remove against a [`ConfigStore`] and an
//! [`ArtifactSource`]:
//!
//! - **Install**: download to the temp dir, verify, place under
//!   `<plugins>/<name>`, register. The temp artifact is always deleted.
//! - **Update**: pick the newest release, back up, delete old files (the
//!   record stays), install the new version over the existing record.
//! - **Remove**: delete files, then the record.
//!
//! When files change on disk but the registry cannot follow, the error is a
//! [`PartialState`] and nothing is rolled back.

use std::cmp::Ordering;
use std::path::{Component, Path};

use chrono::Utc;
use plugdock_core::config::{ConfigStore, PluginRecord};
use plugdock_core::error::{Error, PartialState, Result};
use plugdock_core::source::ArtifactSource;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::checksum;
use crate::placement;
use crate::progress::{Monotonic, ProgressBand, ProgressReporter};

/// Directory under the temp dir that holds pre-update backups
pub const BACKUP_DIR_NAME: &str = "backups";

/// Successful result of a lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed(PluginRecord),
    Updated {
        previous_version: String,
        record: PluginRecord,
    },
    UpToDate(PluginRecord),
    /// Installed version is newer than anything the source publishes
    AheadOfRelease {
        record: PluginRecord,
        latest_version: String,
    },
    Removed(PluginRecord),
}

impl Outcome {
    /// The record the operation ended with (the removed one for `Removed`)
    pub fn record(&self) -> &PluginRecord {
        match self {
            Self::Installed(record)
            | Self::Updated { record, .. }
            | Self::UpToDate(record)
            | Self::AheadOfRelease { record, .. }
            | Self::Removed(record) => record,
        }
    }

    /// Human-readable summary
    pub fn message(&self) -> String {
        match self {
            Self::Installed(record) => format!(
                "Installed {} {} to {}",
                record.name,
                record.version,
                record
                    .install_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            Self::Updated {
                previous_version,
                record,
            } => format!(
                "Updated {} from {} to {}",
                record.name, previous_version, record.version
            ),
            Self::UpToDate(record) => format!(
                "{} is already up to date ({})",
                record.name, record.version
            ),
            Self::AheadOfRelease {
                record,
                latest_version,
            } => format!(
                "{} {} is newer than the latest release ({}); nothing to update",
                record.name, record.version, latest_version
            ),
            Self::Removed(record) => format!("Removed {} {}", record.name, record.version),
        }
    }
}

/// Success/failure summary of one operation, for display
#[derive(Debug)]
pub struct OperationReport {
    pub success: bool,
    pub message: String,
    pub outcome: Option<Outcome>,
    pub error: Option<Error>,
}

impl From<Result<Outcome>> for OperationReport {
    fn from(result: Result<Outcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                message: outcome.message(),
                outcome: Some(outcome),
                error: None,
            },
            Err(error) => Self {
                success: false,
                message: error.to_string(),
                outcome: None,
                error: Some(error),
            },
        }
    }
}

/// Orchestrates plugin installs, updates, and removals
///
/// Owns the settings store for the duration of the session; every registry
/// change goes through it. Operations take `&mut self`, so only one runs at
/// a time.
pub struct PluginCoordinator<S> {
    store: ConfigStore,
    source: S,
}

impl<S> std::fmt::Debug for PluginCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCoordinator")
            .field("store", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl<S: ArtifactSource> PluginCoordinator<S> {
    /// Create a coordinator, loading the store if it is not loaded yet
    pub fn new(mut store: ConfigStore, source: S) -> Result<Self> {
        store.settings()?;
        Ok(Self { store, source })
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_store(self) -> ConfigStore {
        self.store
    }

    /// Installable candidates across all releases of the source
    pub async fn list_available(&self) -> Result<Vec<PluginRecord>> {
        let releases = self.source.list_releases().await?;
        let author = self.store.snapshot()?.github_owner.clone();
        let candidates = catalog::candidates_from_releases(&releases, &author);
        debug!(
            releases = releases.len(),
            candidates = candidates.len(),
            "Built plugin catalog"
        );
        Ok(candidates)
    }

    /// Registry snapshot in store order
    pub fn list_installed(&self) -> &[PluginRecord] {
        self.store.installed()
    }

    /// Resolve `name` (case-insensitive) to a candidate, at `version` if given
    pub async fn find_candidate(&self, name: &str, version: Option<&str>) -> Result<PluginRecord> {
        let candidates = self.list_available().await?;
        catalog::find_candidate(&candidates, name, version).cloned()
    }

    /// Install a candidate that has no registry record yet
    pub async fn install(
        &mut self,
        candidate: PluginRecord,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome> {
        let monitor = Monotonic::new(progress);
        let band = ProgressBand::new(&monitor);

        self.ensure_persisted()?;
        let record = self.install_inner(candidate, band, false).await?;

        let outcome = Outcome::Installed(record);
        monitor.complete(&outcome.message());
        Ok(outcome)
    }

    /// Replace an installed plugin with the newest available version
    pub async fn update(&mut self, name: &str, progress: &dyn ProgressReporter) -> Result<Outcome> {
        let monitor = Monotonic::new(progress);
        let band = ProgressBand::new(&monitor);

        self.ensure_persisted()?;
        band.report(5.0, "Checking installed version");
        let installed = self
            .store
            .get_installed(name)
            .cloned()
            .ok_or_else(|| Error::NotInstalled(name.to_string()))?;

        band.report(15.0, "Checking for updates");
        let candidates = self.list_available().await?;
        let mut latest = catalog::select_latest(&candidates, name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        band.report(20.0, &format!("Latest version is {}", latest.version));

        let current = match catalog::compare_versions(&installed.version, &latest.version) {
            Ordering::Less => None,
            Ordering::Equal => Some(Outcome::UpToDate(installed.clone())),
            Ordering::Greater => {
                warn!(
                    plugin = %name,
                    installed = %installed.version,
                    latest = %latest.version,
                    "Installed version is newer than the latest release"
                );
                Some(Outcome::AheadOfRelease {
                    record: installed.clone(),
                    latest_version: latest.version.clone(),
                })
            }
        };
        if let Some(outcome) = current {
            info!(plugin = %name, version = %installed.version, "Nothing to update");
            monitor.complete(&outcome.message());
            return Ok(outcome);
        }

        let (backup_enabled, temp_dir) = {
            let settings = self.store.snapshot()?;
            (settings.backup_before_update, settings.temp_directory.clone())
        };
        if backup_enabled {
            band.report(25.0, "Backing up current version");
            if let Some(path) = installed.install_path().filter(|p| placement::path_exists(p)) {
                match placement::backup_installation(
                    path,
                    &temp_dir.join(BACKUP_DIR_NAME),
                    &installed.name,
                    Utc::now(),
                ) {
                    Ok(backup) => info!(plugin = %name, backup = %backup.display(), "Backup created"),
                    Err(e) => warn!(plugin = %name, error = %e, "Backup failed, continuing update"),
                }
            }
        }

        // The registry record keeps its exact name
        latest.name = installed.name.clone();

        band.report(30.0, "Removing old version");
        self.remove_inner(name, false)?;
        band.report(35.0, "Installing new version");

        let record = self
            .install_inner(latest, band.sub(35.0, 95.0), true)
            .await?;

        info!(
            plugin = %record.name,
            from = %installed.version,
            to = %record.version,
            "Plugin updated"
        );
        let outcome = Outcome::Updated {
            previous_version: installed.version,
            record,
        };
        monitor.complete(&outcome.message());
        Ok(outcome)
    }

    /// Delete an installed plugin's files and, if `update_registry`, its record
    pub fn remove(
        &mut self,
        name: &str,
        update_registry: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome> {
        let monitor = Monotonic::new(progress);
        let band = ProgressBand::new(&monitor);

        self.ensure_persisted()?;
        band.report(10.0, "Removing files");
        let record = self.remove_inner(name, update_registry)?;

        info!(plugin = %name, update_registry, "Plugin removed");
        let outcome = Outcome::Removed(record);
        monitor.complete(&outcome.message());
        Ok(outcome)
    }

    /// Refuse to build on a snapshot that never reached disk
    fn ensure_persisted(&mut self) -> Result<()> {
        if self.store.is_dirty() {
            warn!(path = %self.store.path().display(), "Retrying save of unsaved registry changes");
            self.store.save()?;
        }
        Ok(())
    }

    async fn install_inner(
        &mut self,
        candidate: PluginRecord,
        band: ProgressBand<'_>,
        replacing: bool,
    ) -> Result<PluginRecord> {
        if !replacing && self.store.get_installed(&candidate.name).is_some() {
            return Err(Error::AlreadyInstalled(candidate.name));
        }
        validate_candidate(&candidate)?;

        let (temp_dir, plugins_dir, verify) = {
            let settings = self.store.snapshot()?;
            (
                settings.temp_directory.clone(),
                settings.plugins_directory.clone(),
                settings.verify_checksums,
            )
        };

        band.report(5.0, "Preparing download");
        std::fs::create_dir_all(&temp_dir).map_err(|e| Error::fs(&temp_dir, e))?;
        let artifact = temp_dir.join(&candidate.file_name);

        info!(
            plugin = %candidate.name,
            version = %candidate.version,
            url = %candidate.download_url,
            "Downloading plugin"
        );
        let download_band = band.sub(10.0, 70.0);
        let message = format!("Downloading {}", candidate.file_name);
        let on_download = |percent: f32| download_band.report(percent, &message);

        let downloaded = self
            .source
            .download(&candidate.download_url, &artifact, &on_download)
            .await;
        let result = match downloaded {
            Ok(()) => self.place_and_register(candidate, &artifact, &plugins_dir, verify, band),
            Err(e) => Err(e),
        };

        discard_artifact(&artifact);
        result
    }

    fn place_and_register(
        &mut self,
        mut record: PluginRecord,
        artifact: &Path,
        plugins_dir: &Path,
        verify: bool,
        band: ProgressBand<'_>,
    ) -> Result<PluginRecord> {
        if verify {
            band.report(72.0, "Verifying checksum");
            let digest = checksum::sha256_file(artifact)?;
            let expected = record
                .checksum
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string);
            if let Some(expected) = expected {
                if !checksum::matches(&expected, &digest) {
                    return Err(Error::ChecksumMismatch {
                        name: record.name,
                        expected,
                        actual: digest,
                    });
                }
            }
            debug!(plugin = %record.name, sha256 = %digest, "Checksum computed");
            record.checksum = Some(digest);
        }

        band.report(80.0, "Installing files");
        let install_dir = plugins_dir.join(&record.name);
        placement::place_artifact(artifact, &record.file_name, &install_dir)?;

        band.report(95.0, "Updating registry");
        record.mark_installed(&install_dir, Utc::now());
        self.store.add_installed(record.clone()).map_err(|e| {
            warn!(plugin = %record.name, error = %e, "Plugin files installed but registry not updated");
            PartialState::InstalledRegistryPending {
                name: record.name.clone(),
                install_path: install_dir.clone(),
                reason: e.to_string(),
            }
        })?;

        info!(plugin = %record.name, version = %record.version, path = %install_dir.display(), "Plugin installed");
        band.report(100.0, "Installed");
        Ok(record)
    }

    fn remove_inner(&mut self, name: &str, update_registry: bool) -> Result<PluginRecord> {
        let record = self
            .store
            .get_installed(name)
            .cloned()
            .ok_or_else(|| Error::NotInstalled(name.to_string()))?;

        if let Some(path) = record.install_path().filter(|p| placement::path_exists(p)) {
            debug!(plugin = %name, path = %path.display(), "Deleting plugin files");
            placement::remove_path(path)?;
        }

        if update_registry {
            self.store.remove_installed(name).map_err(|e| {
                warn!(plugin = %name, error = %e, "Plugin files removed but registry not updated");
                PartialState::FilesRemovedRegistryStale {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(record)
    }
}

/// Names become directory names and file names under managed directories
fn validate_candidate(candidate: &PluginRecord) -> Result<()> {
    for (what, value) in [("name", &candidate.name), ("file name", &candidate.file_name)] {
        if !is_single_component(value) {
            return Err(Error::InvalidInput(format!(
                "Plugin {} '{}' is not a plain file name",
                what, value
            )));
        }
    }
    if candidate.download_url.trim().is_empty() {
        return Err(Error::InvalidInput(format!(
            "Plugin '{}' has no download URL",
            candidate.name
        )));
    }
    Ok(())
}

fn is_single_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.contains(['/', '\\'])
}

/// Best-effort delete of the downloaded artifact
fn discard_artifact(path: &Path) {
    if !placement::path_exists(path) {
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "Could not delete temp artifact");
    }
}
