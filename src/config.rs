//! Runtime configuration.
//!
//! Precedence: environment variables, then values persisted in the
//! `local_settings` table, then built-in defaults.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::DbState;
use crate::error::StoreError;

pub const DEFAULT_API_BASE_URL: &str = "https://localhost:7024/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const APP_DIR_NAME: &str = "bakery-movil";

pub const ENV_API_URL: &str = "BAKERY_API_URL";
pub const ENV_DATA_DIR: &str = "BAKERY_DATA_DIR";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "BAKERY_HTTP_TIMEOUT_SECS";
pub const ENV_ACCEPT_INVALID_CERTS: &str = "BAKERY_ACCEPT_INVALID_CERTS";

/// `local_settings` location of the persisted API base URL.
pub const SETTINGS_CATEGORY_API: &str = "api";
pub const SETTINGS_KEY_BASE_URL: &str = "base_url";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    /// Skip TLS certificate validation (local development servers only).
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_dir: default_data_dir(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Some(url) = env_non_empty(ENV_API_URL) {
            config.api_base_url = normalize_base_url(&url);
        }
        if let Some(dir) = env_non_empty(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = env_non_empty(ENV_HTTP_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid {ENV_HTTP_TIMEOUT_SECS}"),
            }
        }
        if let Some(raw) = env_non_empty(ENV_ACCEPT_INVALID_CERTS) {
            match parse_flag(&raw) {
                Some(flag) => config.accept_invalid_certs = flag,
                None => warn!(value = %raw, "ignoring invalid {ENV_ACCEPT_INVALID_CERTS}"),
            }
        }

        config
    }

    /// Apply the base URL persisted in the store unless the environment
    /// already set one.
    pub fn with_stored_settings(mut self, db: &DbState) -> Result<Self, StoreError> {
        if env_non_empty(ENV_API_URL).is_some() {
            return Ok(self);
        }
        if let Some(url) = db.get_setting(SETTINGS_CATEGORY_API, SETTINGS_KEY_BASE_URL)? {
            if !url.trim().is_empty() {
                self.api_base_url = normalize_base_url(&url);
            }
        }
        Ok(self)
    }

    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = normalize_base_url(url);
        self
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("Images")
    }
}

/// Persist a new API base URL for later runs.
pub fn store_api_base_url(db: &DbState, url: &str) -> Result<String, StoreError> {
    let normalized = normalize_base_url(url);
    db.set_setting(SETTINGS_CATEGORY_API, SETTINGS_KEY_BASE_URL, &normalized)?;
    info!(url = %normalized, "Stored API base URL");
    Ok(normalized)
}

/// Normalise the API base URL:
/// - trim whitespace
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Platform data directory for the app.
pub fn default_data_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join(APP_DIR_NAME)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
