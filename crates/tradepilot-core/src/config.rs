//! Client configuration management.
//!
//! Settings are read from `~/.config/tradepilot/client.json` when present,
//! then overridden from the environment (`TRADEPILOT_API_URL`,
//! `TRADEPILOT_REFRESH_ON_FORBIDDEN`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
pub const APP_NAME: &str = "tradepilot";

/// Config file name
const CONFIG_FILE: &str = "client.json";

pub const ENV_API_URL: &str = "TRADEPILOT_API_URL";
pub const ENV_REFRESH_ON_FORBIDDEN: &str = "TRADEPILOT_REFRESH_ON_FORBIDDEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend root every request path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_register_path")]
    pub register_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_me_path")]
    pub me_path: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Treat 403 like 401 and attempt a session refresh.
    #[serde(default)]
    pub refresh_on_forbidden: bool,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_register_path() -> String {
    "/auth/register".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_me_path() -> String {
    "/auth/me".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            refresh_path: default_refresh_path(),
            login_path: default_login_path(),
            register_path: default_register_path(),
            logout_path: default_logout_path(),
            me_path: default_me_path(),
            timeout_secs: default_timeout_secs(),
            refresh_on_forbidden: false,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load from the user config file (if any), then apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let path = config_path(CONFIG_FILE)?;
        Self::load_from(&path, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit file and variable lookup.
    /// A missing file means defaults.
    pub fn load_from<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        Ok(config.with_overrides(lookup))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(flag) = lookup(ENV_REFRESH_ON_FORBIDDEN) {
            self.refresh_on_forbidden = parse_flag(&flag);
        }
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Path of a file inside the tradepilot config directory.
pub fn config_path(file_name: &str) -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    Ok(config_dir.join(APP_NAME).join(file_name))
}
