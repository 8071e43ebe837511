//! File-backed settings store
//!
//! Every mutation goes through [`ConfigStore::update`], which applies the
//! change to the in-memory snapshot and then writes the whole document. The
//! write goes to a sibling temp file first and is renamed over the settings
//! file, so a crash never leaves a half-written document behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{LauncherSettings, PluginRecord};
use crate::error::{Error, PartialState, Result};

/// Settings file name inside the config directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Owner of the settings file and its in-memory snapshot
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    settings: Option<LauncherSettings>,
    dirty: bool,
}

impl ConfigStore {
    /// Store backed by an explicit settings file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: None,
            dirty: false,
        }
    }

    /// Store backed by `<dir>/settings.json`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(SETTINGS_FILE_NAME))
    }

    /// Store at the default location (see [`LauncherSettings::config_dir`])
    pub fn default_location() -> Result<Self> {
        Ok(Self::in_dir(LauncherSettings::config_dir()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.settings.is_some()
    }

    /// True when the snapshot holds a change that failed to persist
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read the settings file, creating it with defaults if it is missing
    ///
    /// A file that exists but cannot be read or parsed is an error; it is
    /// never replaced with defaults.
    pub fn load(&mut self) -> Result<&LauncherSettings> {
        let settings = if self.path.exists() {
            let contents = fs::read_to_string(&self.path)
                .map_err(|e| Error::config_io(&self.path, format!("failed to read: {}", e)))?;
            let mut settings: LauncherSettings = serde_json::from_str(&contents)
                .map_err(|e| Error::config_io(&self.path, format!("failed to parse: {}", e)))?;

            let repaired = settings.normalize();
            if !repaired.is_empty() {
                warn!(
                    plugins = ?repaired,
                    "Cleared incomplete installation stamps found in settings file"
                );
            }
            debug!(path = %self.path.display(), plugins = settings.installed_plugins.len(), "Loaded settings");
            settings
        } else {
            let base_dir = self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let settings = LauncherSettings::with_base_dir(&base_dir);
            write_settings(&self.path, &settings)?;
            info!(path = %self.path.display(), "Created default settings file");
            settings
        };

        if settings.auto_create_directories {
            ensure_directories(&settings);
        }

        self.dirty = false;
        Ok(&*self.settings.insert(settings))
    }

    /// Current snapshot, loading it first if nothing is loaded yet
    pub fn settings(&mut self) -> Result<&LauncherSettings> {
        if self.settings.is_none() {
            self.load()?;
        }
        self.snapshot()
    }

    /// Current snapshot without touching disk
    pub fn snapshot(&self) -> Result<&LauncherSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| Error::config_io(&self.path, "settings have not been loaded"))
    }

    /// Exact-name lookup against the in-memory snapshot
    ///
    /// Never re-reads the file; returns `None` if nothing is loaded.
    pub fn get_installed(&self, name: &str) -> Option<&PluginRecord> {
        self.settings.as_ref()?.find_installed(name)
    }

    /// Registry snapshot in store order
    pub fn installed(&self) -> &[PluginRecord] {
        self.settings
            .as_ref()
            .map(|s| s.installed_plugins.as_slice())
            .unwrap_or_default()
    }

    /// Apply `mutate` to the settings and persist the result
    ///
    /// If `mutate` fails nothing changes. If the write fails the snapshot
    /// keeps the new value, the store is marked dirty, and
    /// [`PartialState::RegistryPersistFailed`] is returned.
    pub fn update<T, F>(&mut self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut LauncherSettings) -> Result<T>,
    {
        let mut next = self.settings()?.clone();
        let value = mutate(&mut next)?;
        self.settings = Some(next);
        self.dirty = true;
        self.save()?;
        Ok(value)
    }

    /// Upsert a record by name
    pub fn add_installed(&mut self, record: PluginRecord) -> Result<()> {
        debug!(plugin = %record.name, version = %record.version, "Registering plugin");
        self.update(|settings| {
            settings.upsert_installed(record);
            Ok(())
        })
    }

    /// Delete a record by name; missing names are not an error
    pub fn remove_installed(&mut self, name: &str) -> Result<()> {
        debug!(plugin = %name, "Unregistering plugin");
        self.update(|settings| {
            settings.remove_installed(name);
            Ok(())
        })
    }

    /// Write the current snapshot to disk
    pub fn save(&mut self) -> Result<()> {
        let settings = self.snapshot()?;
        write_settings(&self.path, settings).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to persist settings");
            PartialState::RegistryPersistFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        self.dirty = false;
        Ok(())
    }
}

fn write_settings(path: &Path, settings: &LauncherSettings) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| Error::config_io(path, format!("failed to create directory: {}", e)))?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::config_io(path, format!("failed to serialize: {}", e)))?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, contents)
        .map_err(|e| Error::config_io(path, format!("failed to write: {}", e)))?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::config_io(path, format!("failed to replace: {}", e)));
    }
    Ok(())
}

fn ensure_directories(settings: &LauncherSettings) {
    for dir in [&settings.plugins_directory, &settings.temp_directory] {
        if let Err(e) = fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "Could not create directory");
        }
    }
}
