//! Configuration resolution for QR-Pass.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/qrpass/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete QR-Pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where durable state lives.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// Message store location. Defaults to [`database_path`].
    pub database_path: Option<PathBuf>,
    /// Directory holding pending-exchange key files. Defaults to [`keys_dir`].
    pub keys_dir: Option<PathBuf>,
}

/// Scan event handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum interval between two processed scan events (milliseconds).
    pub debounce_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

/// Logging output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Database path, falling back to the platform default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(database_path)
    }

    /// Key directory, falling back to the platform default.
    pub fn resolved_keys_dir(&self) -> Option<PathBuf> {
        self.storage.keys_dir.clone().or_else(keys_dir)
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let global_path = global_config_path().filter(|p| p.exists());
    let files: Vec<&Path> = global_path.as_deref().into_iter().chain(explicit_path).collect();

    let mut config = resolve_files(&files)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Layer config files over the defaults, later files winning per field.
fn resolve_files(files: &[&Path]) -> Result<Config> {
    let mut layered = serde_json::to_value(Config::default())?;
    for path in files {
        merge_layer(&mut layered, load_config_file(path)?);
    }
    serde_json::from_value(layered)
        .map_err(|e| Error::Config(format!("Invalid merged configuration: {e}")))
}

/// Platform configuration directory for QR-Pass.
fn base_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".qrpass"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/qrpass"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("qrpass"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    base_dir().map(|d| d.join("settings.json"))
}

/// Get the default message store path.
pub fn database_path() -> Option<PathBuf> {
    base_dir().map(|d| d.join("qrpass.db"))
}

/// Get the default directory for pending-exchange key files.
pub fn keys_dir() -> Option<PathBuf> {
    base_dir().map(|d| d.join("keys"))
}

/// Read one config file, checking it against the schema but keeping only
/// the fields it actually sets.
fn load_config_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    Config::deserialize(&value).map_err(|e| {
        Error::Config(format!("Invalid config file {}: {}", path.display(), e))
    })?;
    Ok(value)
}

fn merge_layer(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_layer(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("QRPASS_DB_PATH") {
        config.storage.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("QRPASS_KEYS_DIR") {
        config.storage.keys_dir = Some(PathBuf::from(val));
    }
    if let Some(val) = var("QRPASS_DEBOUNCE_MS") {
        if let Ok(n) = val.parse() {
            config.scan.debounce_ms = n;
        }
    }
    if let Some(val) = var("QRPASS_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = var("QRPASS_LOG_JSON") {
        config.logging.json = matches!(val.as_str(), "1" | "true" | "yes");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_debounce_is_200ms() {
        let config = Config::default();
        assert_eq!(config.scan.debounce_ms, 200);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: Config =
            serde_json::from_str(r#"{"storage": {"database_path": "/tmp/q.db"}}"#).unwrap();
        assert_eq!(config.storage.database_path, Some(PathBuf::from("/tmp/q.db")));
        assert_eq!(config.scan.debounce_ms, 200);
    }

    #[test]
    fn partial_section_keeps_defaults_for_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"logging": {"level": "debug"}}"#).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);

        let config: Config = serde_json::from_str(r#"{"scan": {}}"#).unwrap();
        assert_eq!(config.scan.debounce_ms, 200);
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"scan": {"debounce_ms": 50}, "storage": {"keys_dir": "/var/qrpass/keys"}}"#,
        )
        .unwrap();

        let config = resolve_files(&[path.as_path()]).unwrap();
        assert_eq!(config.scan.debounce_ms, 50);
        assert_eq!(config.storage.keys_dir, Some(PathBuf::from("/var/qrpass/keys")));
        assert!(config.storage.database_path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn explicit_file_layers_over_global_per_field() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        let explicit = dir.path().join("explicit.json");
        std::fs::write(
            &global,
            r#"{"scan": {"debounce_ms": 50}, "logging": {"level": "debug", "json": true}}"#,
        )
        .unwrap();
        std::fs::write(
            &explicit,
            r#"{"storage": {"keys_dir": "/k"}, "logging": {"level": "warn"}}"#,
        )
        .unwrap();

        let config = resolve_files(&[global.as_path(), explicit.as_path()]).unwrap();
        assert_eq!(config.scan.debounce_ms, 50);
        assert_eq!(config.storage.keys_dir, Some(PathBuf::from("/k")));
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
    }

    #[test]
    fn wrongly_typed_field_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"scan": {"debounce_ms": "fast"}}"#).unwrap();
        assert!(matches!(resolve_files(&[path.as_path()]), Err(Error::Config(_))));
    }

    #[test]
    fn unparsable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(load_config_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_apply_and_ignore_bad_numbers() {
        let env: HashMap<&str, &str> = [
            ("QRPASS_DB_PATH", "/data/q.db"),
            ("QRPASS_DEBOUNCE_MS", "not-a-number"),
            ("QRPASS_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(ToString::to_string));
        assert_eq!(config.storage.database_path, Some(PathBuf::from("/data/q.db")));
        assert_eq!(config.scan.debounce_ms, 200);
        assert!(config.logging.json);
    }
}
