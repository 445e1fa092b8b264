//! Application settings storage
//!
//! Stores configuration like the record dump location in a JSON file in the
//! app data directory. Environment variables win over stored values.

use crate::query::{SortDirective, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Global settings instance
static SETTINGS: RwLock<Option<Settings>> = RwLock::new(None);

/// Path to config file (set during init)
static CONFIG_PATH: RwLock<Option<PathBuf>> = RwLock::new(None);

pub const RECORDS_ENV: &str = "CATEGORIA_RECORDS";
pub const BIND_ENV: &str = "CATEGORIA_BIND";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Category dump exported from the catalog service
    #[serde(default)]
    pub records_path: Option<String>,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// e.g. "sort_order:asc"; None keeps fetch order
    #[serde(default)]
    pub default_sort: Option<String>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_bind_addr() -> String {
    "127.0.0.1:3742".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            records_path: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            default_sort: None,
            bind_addr: default_bind_addr(),
        }
    }
}

impl Settings {
    /// Load settings from disk or create default
    fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "unreadable settings file, using defaults");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    /// Save settings to disk
    fn save(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, content)
            .map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }
}

/// Default app data directory (`<data dir>/categoria`)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("categoria"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Initialize settings with the app data directory
pub fn init(app_data_dir: PathBuf) {
    let config_path = app_data_dir.join("settings.json");
    let settings = Settings::load(&config_path);

    if let Ok(mut guard) = CONFIG_PATH.write() {
        *guard = Some(config_path);
    }
    if let Ok(mut guard) = SETTINGS.write() {
        *guard = Some(settings);
    }
}

pub fn config_path() -> Option<PathBuf> {
    CONFIG_PATH.read().ok()?.clone()
}

/// Copy of the current settings (defaults if not initialized)
pub fn current() -> Settings {
    SETTINGS
        .read()
        .ok()
        .and_then(|guard| guard.clone())
        .unwrap_or_default()
}

/// Apply `change` to the stored settings and persist them
fn update<F: FnOnce(&mut Settings)>(change: F) -> Result<(), String> {
    let mut settings_guard = SETTINGS.write()
        .map_err(|_| "Failed to acquire settings lock")?;

    let settings = settings_guard.get_or_insert_with(Settings::default);
    change(settings);

    let config_path = CONFIG_PATH.read()
        .map_err(|_| "Failed to acquire config path lock")?
        .clone()
        .ok_or("Settings not initialized")?;

    settings.save(&config_path)
}

// ==================== Record dump ====================

/// Record dump path (checks env var first, then stored setting)
pub fn get_records_path() -> Option<String> {
    if let Ok(path) = std::env::var(RECORDS_ENV) {
        if !path.is_empty() {
            return Some(path);
        }
    }
    current().records_path
}

pub fn set_records_path(path: Option<String>) -> Result<(), String> {
    update(|s| s.records_path = path.filter(|p| !p.is_empty()))
}

// ==================== Listing defaults ====================

pub fn default_page_size_setting() -> usize {
    current().default_page_size.clamp(1, MAX_PAGE_SIZE)
}

pub fn set_default_page_size(size: usize) -> Result<(), String> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(format!("Page size must be between 1 and {}", MAX_PAGE_SIZE));
    }
    update(|s| s.default_page_size = size)
}

/// Stored default sort, ignored (with a warning) if it no longer parses
pub fn default_sort() -> Option<SortDirective> {
    let raw = current().default_sort?;
    match raw.parse() {
        Ok(directive) => Some(directive),
        Err(e) => {
            tracing::warn!(value = %raw, error = %e, "ignoring invalid default_sort setting");
            None
        }
    }
}

pub fn set_default_sort(sort: Option<String>) -> Result<(), String> {
    let sort = match sort.filter(|s| !s.is_empty()) {
        Some(s) => {
            let directive: SortDirective = s.parse().map_err(|e| format!("{}", e))?;
            Some(directive.to_string())
        }
        None => None,
    };
    update(|s| s.default_sort = sort)
}

// ==================== Server ====================

/// Bind address for the HTTP server (checks env var first, then stored setting)
pub fn bind_addr() -> String {
    if let Ok(addr) = std::env::var(BIND_ENV) {
        if !addr.is_empty() {
            return addr;
        }
    }
    current().bind_addr
}

pub fn set_bind_addr(addr: String) -> Result<(), String> {
    if addr.is_empty() {
        return Err("Bind address cannot be empty".to_string());
    }
    update(|s| s.bind_addr = addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"records_path": "/tmp/categories.json"}"#).unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.records_path.as_deref(), Some("/tmp/categories.json"));
        assert_eq!(settings.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.bind_addr, "127.0.0.1:3742");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            records_path: Some("dump.json".into()),
            default_page_size: 25,
            default_sort: Some("name:desc".into()),
            bind_addr: "0.0.0.0:8080".into(),
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }
}
