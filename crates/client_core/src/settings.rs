//! Connection settings and the small set of preferences that survive a
//! restart (theme, panel width, sort order, view mode). Everything else in
//! the browser state is session-only.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use shared::domain::{Theme, ViewMode};
use thiserror::Error;
use tracing::warn;

use crate::view::SortOrder;

pub const SETTINGS_FILE: &str = "asset-browser.toml";
pub const PREFERENCES_FILE: &str = "preferences.json";
const APP_DIR: &str = "asset-browser";

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 500;

pub const MIN_PANEL_WIDTH: f32 = 20.0;
pub const MAX_PANEL_WIDTH: f32 = 60.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed preferences in {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no user config directory available")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub page_limit: u32,
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".into(),
            page_limit: DEFAULT_PAGE_LIMIT,
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `asset-browser.toml` in the working directory, then
/// `ASSET_BROWSER_*` environment variables.
pub fn load_settings() -> ClientSettings {
    let file_values = fs::read_to_string(SETTINGS_FILE)
        .ok()
        .and_then(|raw| match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(values) => Some(values),
            Err(err) => {
                warn!(file = SETTINGS_FILE, error = %err, "settings: ignoring malformed file");
                None
            }
        })
        .unwrap_or_default();
    settings_from_sources(&file_values, |key| std::env::var(key).ok())
}

pub fn settings_from_sources(
    file_values: &HashMap<String, toml::Value>,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Some(v) = file_values.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_values.get("page_limit").and_then(toml::Value::as_integer) {
        settings.page_limit = normalize_page_limit(v);
    }
    if let Some(v) = file_values.get("log_filter").and_then(toml::Value::as_str) {
        settings.log_filter = v.to_string();
    }

    if let Some(v) = env("ASSET_BROWSER_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("ASSET_BROWSER_PAGE_LIMIT") {
        match v.trim().parse::<i64>() {
            Ok(parsed) => settings.page_limit = normalize_page_limit(parsed),
            Err(_) => warn!(value = %v, "settings: ignoring non-numeric ASSET_BROWSER_PAGE_LIMIT"),
        }
    }
    if let Some(v) = env("ASSET_BROWSER_LOG") {
        settings.log_filter = v;
    }

    settings
}

fn normalize_page_limit(raw: i64) -> u32 {
    if raw < 1 {
        DEFAULT_PAGE_LIMIT
    } else {
        raw.min(i64::from(MAX_PAGE_LIMIT)) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    /// Master panel width as a percentage of the window.
    pub panel_width: f32,
    pub sort_order: SortOrder,
    pub view_mode: ViewMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            panel_width: 40.0,
            sort_order: SortOrder::Newest,
            view_mode: ViewMode::List,
        }
    }
}

impl Preferences {
    /// Widths outside the allowed band are rejected, leaving the old value.
    pub fn set_panel_width(&mut self, width: f32) -> bool {
        if (MIN_PANEL_WIDTH..=MAX_PANEL_WIDTH).contains(&width) {
            self.panel_width = width;
            true
        } else {
            false
        }
    }

    fn sanitized(mut self) -> Self {
        if !(MIN_PANEL_WIDTH..=MAX_PANEL_WIDTH).contains(&self.panel_width) {
            self.panel_width = Preferences::default().panel_width;
        }
        self
    }
}

pub fn default_preferences_path() -> Result<PathBuf, SettingsError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(PREFERENCES_FILE))
        .ok_or(SettingsError::NoConfigDir)
}

/// Missing file yields defaults; a corrupt file is an error.
pub fn load_preferences(path: &Path) -> Result<Preferences, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Preferences::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let prefs: Preferences = serde_json::from_str(&raw).map_err(|source| SettingsError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(prefs.sanitized())
}

pub fn save_preferences(path: &Path, prefs: &Preferences) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let encoded = serde_json::to_string_pretty(prefs)?;
    fs::write(path, encoded).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
