//! Settings record and its JSON file store

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Persisted bridge settings
///
/// Keys on disk keep the names the firmware tooling has always used
/// (`com_port`, `wifi_ssid`, `wifi_pass`) so existing files keep loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "com_port", default)]
    pub port: String,
    #[serde(rename = "wifi_ssid", default)]
    pub network_name: String,
    #[serde(rename = "wifi_pass", default)]
    pub network_secret: String,
}

impl Settings {
    pub fn new(
        port: impl Into<String>,
        network_name: impl Into<String>,
        network_secret: impl Into<String>,
    ) -> Self {
        Self {
            port: port.into(),
            network_name: network_name.into(),
            network_secret: network_secret.into(),
        }
    }

    /// Port and network name are both required before the bridge can run
    pub fn is_configured(&self) -> bool {
        !self.port.is_empty() && !self.network_name.is_empty()
    }
}

/// Loads and saves [`Settings`] at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `$XDG_CONFIG_HOME/bongo-bridge/config.json` (or `./` without a config dir)
    pub fn at_default_path() -> Self {
        Self::new(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults
    ///
    /// A missing file is the normal first-run case. An unreadable or
    /// malformed file is logged and also yields defaults so the setup
    /// dialog can overwrite it.
    pub fn load(&self) -> Settings {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No config file found, using defaults");
            return Settings::default();
        }

        match self.try_load() {
            Ok(settings) => {
                info!(
                    path = %self.path.display(),
                    port = %settings.port,
                    ssid = %settings.network_name,
                    "Loaded config"
                );
                settings
            }
            Err(e) => {
                error!(path = %self.path.display(), error = ?e, "Failed to load config, using defaults");
                Settings::default()
            }
        }
    }

    fn try_load(&self) -> Result<Settings> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", self.path))
    }

    /// Overwrite the file with `settings`
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory {:?}", parent))?;
            }
        }

        let json = serde_json::to_string_pretty(settings)
            .context("Failed to serialize config to JSON")?;

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write config to {:?}", self.path))?;

        info!(path = %self.path.display(), "Saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("config.json"));
        (dir, store)
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load(), Settings::default());
        assert!(!store.load().is_configured());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (_dir, store) = temp_store();
        let settings = Settings::new("COM3", "HomeNet", "s3cr3t");

        store.save(&settings).unwrap();

        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_file_uses_legacy_key_names() {
        let (_dir, store) = temp_store();
        store.save(&Settings::new("/dev/ttyUSB0", "HomeNet", "pw")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["com_port"], "/dev/ttyUSB0");
        assert_eq!(value["wifi_ssid"], "HomeNet");
        assert_eq!(value["wifi_pass"], "pw");
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"com_port": "/dev/ttyACM0"}"#).unwrap();

        let settings = store.load();
        assert_eq!(settings.port, "/dev/ttyACM0");
        assert!(settings.network_name.is_empty());
        assert!(!settings.is_configured());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_is_configured_requires_port_and_ssid() {
        assert!(Settings::new("COM3", "HomeNet", "").is_configured());
        assert!(!Settings::new("", "HomeNet", "pw").is_configured());
        assert!(!Settings::new("COM3", "", "pw").is_configured());
    }
}
