//! Launcher settings and the installed-plugin registry
//!
//! [`LauncherSettings`] is the persisted JSON document; [`ConfigStore`] owns
//! the file on disk and is the only path through which it changes.

mod store;

pub use store::{ConfigStore, SETTINGS_FILE_NAME};

use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "PLUGDOCK_CONFIG_DIR";

/// Environment variables consulted, in order, when no token is stored
pub const TOKEN_ENV_VARS: &[&str] = &["PLUGDOCK_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Keys accepted by [`LauncherSettings::get`] and [`LauncherSettings::set`]
pub const SETTING_KEYS: &[&str] = &[
    "github_owner",
    "github_repo",
    "github_token",
    "plugins_directory",
    "temp_directory",
    "auto_create_directories",
    "verify_checksums",
    "backup_before_update",
];

/// Identity and installation state of one plugin
///
/// A record is installed iff both the install path and the installed date
/// are set. The two are only changed together through
/// [`mark_installed`](Self::mark_installed) and
/// [`clear_installation`](Self::clear_installation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    install_path: PathBuf,
    #[serde(default)]
    installed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl PluginRecord {
    /// Create a record that is not installed
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            download_url: String::new(),
            file_name: String::new(),
            install_path: PathBuf::new(),
            installed_date: None,
            file_size: 0,
            checksum: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the artifact this record is downloaded from
    pub fn with_artifact(
        mut self,
        download_url: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
    ) -> Self {
        self.download_url = download_url.into();
        self.file_name = file_name.into();
        self.file_size = file_size;
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn is_installed(&self) -> bool {
        !self.install_path.as_os_str().is_empty() && self.installed_date.is_some()
    }

    /// Installation directory, `None` when not installed
    pub fn install_path(&self) -> Option<&Path> {
        self.is_installed().then_some(self.install_path.as_path())
    }

    pub fn installed_date(&self) -> Option<DateTime<Utc>> {
        self.installed_date.filter(|_| self.is_installed())
    }

    pub fn mark_installed(&mut self, path: impl Into<PathBuf>, at: DateTime<Utc>) {
        self.install_path = path.into();
        self.installed_date = Some(at);
    }

    pub fn clear_installation(&mut self) {
        self.install_path = PathBuf::new();
        self.installed_date = None;
    }

    /// Repair a record read from disk that has only one half of the
    /// installation stamp. Returns true if anything changed.
    fn normalize(&mut self) -> bool {
        let has_path = !self.install_path.as_os_str().is_empty();
        if has_path != self.installed_date.is_some() {
            self.clear_installation();
            return true;
        }
        false
    }
}

/// Process-wide settings plus the registry of installed plugins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherSettings {
    pub github_owner: String,
    pub github_repo: String,
    #[serde(default)]
    pub github_token: Option<String>,
    pub plugins_directory: PathBuf,
    pub temp_directory: PathBuf,
    pub auto_create_directories: bool,
    pub verify_checksums: bool,
    pub backup_before_update: bool,
    #[serde(default)]
    pub installed_plugins: Vec<PluginRecord>,
}

impl LauncherSettings {
    /// Default settings for a config directory
    pub fn with_base_dir(config_dir: &Path) -> Self {
        Self {
            github_owner: String::new(),
            github_repo: String::new(),
            github_token: None,
            plugins_directory: config_dir.join("plugins"),
            temp_directory: env::temp_dir().join("plugdock"),
            auto_create_directories: true,
            verify_checksums: true,
            backup_before_update: true,
            installed_plugins: Vec::new(),
        }
    }

    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(custom_dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join("plugdock"))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Could not determine config directory; pass --config or set {}",
                    CONFIG_DIR_ENV
                ))
            })
    }

    /// Exact-name registry lookup
    pub fn find_installed(&self, name: &str) -> Option<&PluginRecord> {
        self.installed_plugins.iter().find(|p| p.name == name)
    }

    /// Insert or replace (in place) the record with the same name
    pub fn upsert_installed(&mut self, record: PluginRecord) {
        match self
            .installed_plugins
            .iter_mut()
            .find(|p| p.name == record.name)
        {
            Some(existing) => *existing = record,
            None => self.installed_plugins.push(record),
        }
    }

    /// Remove the record with this name; returns whether one was removed
    pub fn remove_installed(&mut self, name: &str) -> bool {
        let before = self.installed_plugins.len();
        self.installed_plugins.retain(|p| p.name != name);
        self.installed_plugins.len() != before
    }

    /// Owner and repository, or an error naming the missing one
    pub fn source_repository(&self) -> Result<(&str, &str)> {
        let owner = self.github_owner.trim();
        let repo = self.github_repo.trim();
        if owner.is_empty() || repo.is_empty() {
            return Err(Error::InvalidInput(
                "No release repository configured. Pass --owner and --repo, or run \
                 `plugdock config set github_owner <owner>` and `plugdock config set github_repo <repo>`."
                    .to_string(),
            ));
        }
        Ok((owner, repo))
    }

    /// Stored token, else the first token found in the environment
    pub fn resolved_token(&self) -> Option<String> {
        self.github_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                TOKEN_ENV_VARS
                    .iter()
                    .find_map(|var| env::var(var).ok().filter(|t| !t.is_empty()))
            })
    }

    pub fn redacted_token(&self) -> Option<String> {
        self.github_token.as_ref().map(|key| {
            // Last four characters, not bytes
            match key.char_indices().rev().nth(3) {
                Some((start, _)) if start > 0 => format!("***{}", &key[start..]),
                _ => "***".to_string(),
            }
        })
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "github_owner" => Ok(self.github_owner.clone()),
            "github_repo" => Ok(self.github_repo.clone()),
            "github_token" => Ok(self
                .redacted_token()
                .unwrap_or_else(|| "(not set)".to_string())),
            "plugins_directory" => Ok(self.plugins_directory.display().to_string()),
            "temp_directory" => Ok(self.temp_directory.display().to_string()),
            "auto_create_directories" => Ok(self.auto_create_directories.to_string()),
            "verify_checksums" => Ok(self.verify_checksums.to_string()),
            "backup_before_update" => Ok(self.backup_before_update.to_string()),
            _ => Err(unknown_key(key)),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "github_owner" => self.github_owner = value.trim().to_string(),
            "github_repo" => self.github_repo = value.trim().to_string(),
            "github_token" => {
                let token = value.trim();
                self.github_token = (!token.is_empty()).then(|| token.to_string());
            }
            "plugins_directory" => self.plugins_directory = parse_dir(key, value)?,
            "temp_directory" => self.temp_directory = parse_dir(key, value)?,
            "auto_create_directories" => self.auto_create_directories = parse_bool(key, value)?,
            "verify_checksums" => self.verify_checksums = parse_bool(key, value)?,
            "backup_before_update" => self.backup_before_update = parse_bool(key, value)?,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        SETTING_KEYS
            .iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Repair half-stamped records; returns the names that were repaired
    fn normalize(&mut self) -> Vec<String> {
        self.installed_plugins
            .iter_mut()
            .filter_map(|p| p.normalize().then(|| p.name.clone()))
            .collect()
    }
}

fn unknown_key(key: &str) -> Error {
    Error::InvalidInput(format!(
        "Unknown configuration key: {}. Valid keys: {}",
        key,
        SETTING_KEYS.join(", ")
    ))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidInput(format!(
            "Invalid {} value: {} (expected true or false)",
            key, other
        ))),
    }
}

fn parse_dir(key: &str, value: &str) -> Result<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} cannot be empty", key)));
    }
    Ok(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn settings() -> LauncherSettings {
        LauncherSettings::with_base_dir(Path::new("/home/user/.config/plugdock"))
    }

    #[test]
    fn test_defaults() {
        let settings = settings();
        assert!(settings.github_owner.is_empty());
        assert!(settings.github_token.is_none());
        assert_eq!(
            settings.plugins_directory,
            PathBuf::from("/home/user/.config/plugdock/plugins")
        );
        assert!(settings.auto_create_directories);
        assert!(settings.verify_checksums);
        assert!(settings.backup_before_update);
        assert!(settings.installed_plugins.is_empty());
    }

    #[test]
    fn test_record_install_stamp_set_and_cleared_together() {
        let mut record = PluginRecord::new("Formatter", "v1.0");
        assert!(!record.is_installed());
        assert!(record.install_path().is_none());

        let now = Utc::now();
        record.mark_installed("/plugins/Formatter", now);
        assert!(record.is_installed());
        assert_eq!(record.install_path(), Some(Path::new("/plugins/Formatter")));
        assert_eq!(record.installed_date(), Some(now));

        record.clear_installation();
        assert!(!record.is_installed());
        assert!(record.installed_date().is_none());
    }

    #[test]
    fn test_normalize_clears_half_stamp() {
        let json = r#"{"name":"A","version":"1","install_path":"/plugins/A","installed_date":null}"#;
        let mut record: PluginRecord = serde_json::from_str(json).unwrap();
        assert!(record.normalize());
        assert!(!record.is_installed());
        assert!(record.install_path.as_os_str().is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut settings = settings();
        settings.upsert_installed(PluginRecord::new("A", "1"));
        settings.upsert_installed(PluginRecord::new("B", "1"));
        settings.upsert_installed(PluginRecord::new("A", "2"));

        assert_eq!(settings.installed_plugins.len(), 2);
        assert_eq!(settings.installed_plugins[0].name, "A");
        assert_eq!(settings.installed_plugins[0].version, "2");
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mut settings = settings();
        settings.upsert_installed(PluginRecord::new("Formatter", "1"));
        assert!(settings.find_installed("Formatter").is_some());
        assert!(settings.find_installed("formatter").is_none());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut settings = settings();
        assert!(!settings.remove_installed("ghost"));
    }

    #[test]
    fn test_set_and_get_values() {
        let mut settings = settings();
        settings.set("github_owner", "acme").unwrap();
        settings.set("verify_checksums", "no").unwrap();
        settings.set("temp_directory", "/var/tmp/pd").unwrap();

        assert_eq!(settings.get("github_owner").unwrap(), "acme");
        assert_eq!(settings.get("verify_checksums").unwrap(), "false");
        assert_eq!(settings.temp_directory, PathBuf::from("/var/tmp/pd"));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut settings = settings();
        let err = settings.set("verify_checksums", "maybe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = settings.set("colour", "blue").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));

        assert!(settings.set("plugins_directory", "  ").is_err());
    }

    #[test]
    fn test_token_is_redacted() {
        let mut settings = settings();
        assert_eq!(settings.get("github_token").unwrap(), "(not set)");

        settings.set("github_token", "ghp_abcdef123456").unwrap();
        assert_eq!(settings.get("github_token").unwrap(), "***3456");

        settings.set("github_token", "abcéxyz").unwrap();
        assert_eq!(settings.get("github_token").unwrap(), "***éxyz");

        settings.set("github_token", "tökén").unwrap();
        assert_eq!(settings.get("github_token").unwrap(), "***ökén");

        settings.set("github_token", "ab").unwrap();
        assert_eq!(settings.get("github_token").unwrap(), "***");

        settings.set("github_token", "").unwrap();
        assert!(settings.github_token.is_none());
    }

    #[test]
    fn test_source_repository_requires_owner_and_repo() {
        let mut settings = settings();
        assert!(settings.source_repository().is_err());

        settings.github_owner = "acme".to_string();
        settings.github_repo = "plugins".to_string();
        assert_eq!(settings.source_repository().unwrap(), ("acme", "plugins"));
    }

    #[test]
    fn test_list_covers_every_key() {
        let items = settings().list().unwrap();
        assert_eq!(items.len(), SETTING_KEYS.len());
    }

    #[test]
    fn test_wire_field_names() {
        let mut settings = settings();
        let mut record = PluginRecord::new("Formatter", "v2.0").with_artifact(
            "https://example.com/Formatter.zip",
            "Formatter.zip",
            42,
        );
        record.mark_installed("/plugins/Formatter", Utc::now());
        settings.upsert_installed(record);

        let value = serde_json::to_value(&settings).unwrap();
        for key in SETTING_KEYS {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        let plugin = &value["installed_plugins"][0];
        for key in [
            "name",
            "version",
            "description",
            "author",
            "download_url",
            "file_name",
            "install_path",
            "installed_date",
            "file_size",
            "checksum",
        ] {
            assert!(plugin.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(plugin["file_size"], 42);
    }
}
