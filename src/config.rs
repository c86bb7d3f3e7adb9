//! Configuration for the preset store.
//!
//! Layered, lowest to highest precedence:
//! - Default values
//! - TOML file `.flexpreset/settings.toml`
//! - Environment variables
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FLEXPRESET_` and use double
//! underscores to separate nested levels:
//! - `FLEXPRESET_STORAGE__DIR=/srv/presets` sets `storage.dir`
//! - `FLEXPRESET_WATCH__DEBOUNCE_MS=250` sets `watch.debounce_ms`
//! - `FLEXPRESET_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding the settings file, searched for upward from the
/// current directory.
pub const CONFIG_DIR: &str = ".flexpreset";
const SETTINGS_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "FLEXPRESET_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Directory holding one document per collection. Relative paths are
    /// resolved against the workspace root when one is found.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,

    /// Move documents that fail to parse on first load to `bad_*.bak`
    /// instead of refusing to load them.
    #[serde(default = "default_false")]
    pub quarantine_corrupt: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period before a changed file is reloaded
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How often settled files are drained
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BroadcastConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for everything without an override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `flexpreset::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("presets")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_tick_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage: StorageConfig::default(),
            watch: WatchConfig::default(),
            broadcast: BroadcastConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            quarantine_corrupt: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let root = Self::workspace_root();
        let config_path = root
            .as_ref()
            .map(|root| root.join(CONFIG_DIR).join(SETTINGS_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));

        let mut settings = Self::layered(&config_path)?;
        if let Some(root) = root.filter(|_| settings.storage.dir.is_relative()) {
            settings.storage.dir = root.join(&settings.storage.dir);
        }
        Ok(settings)
    }

    /// Load configuration from a specific file plus the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::layered(path.as_ref())
    }

    fn layered(path: &Path) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            // Double underscore (__) separates nested levels; single
            // underscores stay inside field names. FLEXPRESET_STORAGE is the
            // CLI's directory override, not a section.
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["storage"])
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// Directory containing `.flexpreset`, searching from the current
    /// directory up to the root.
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory.
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_in(Path::new("."), force)
    }

    /// Create a default settings file under `root`.
    pub fn init_config_file_in(root: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.storage.dir, PathBuf::from(".flexpreset/presets"));
        assert!(!settings.storage.quarantine_corrupt);
        assert!(settings.watch.enabled);
        assert_eq!(settings.watch.debounce_ms, 300);
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[storage]
dir = "/srv/presets"
quarantine_corrupt = true

[watch]
debounce_ms = 50

[logging.modules]
"flexpreset::watcher" = "debug"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.storage.dir, PathBuf::from("/srv/presets"));
        assert!(settings.storage.quarantine_corrupt);
        assert_eq!(settings.watch.debounce_ms, 50);
        // Untouched fields of a partially given section keep their defaults
        assert_eq!(settings.watch.tick_ms, 100);
        assert!(settings.broadcast.enabled);
        assert_eq!(settings.logging.modules["flexpreset::watcher"], "debug");
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.watch.tick_ms = 20;
        settings.broadcast.enabled = false;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.watch.tick_ms, 20);
        assert!(!loaded.broadcast.enabled);
    }

    #[test]
    fn test_init_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file_in(temp_dir.path(), false).unwrap();
        assert!(path.ends_with(".flexpreset/settings.toml"));
        assert!(path.exists());

        assert!(Settings::init_config_file_in(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file_in(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.storage, StorageConfig::default());
    }
}
