//! Proxy server configuration.
//!
//! Read from `~/.config/tradepilot/proxy.json` when present, then overridden
//! from `TRADEPILOT_PROXY_BIND`, `TRADEPILOT_UPSTREAM_URL` and
//! `TRADEPILOT_PROXY_LOG_DIR`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tradepilot_core::config::config_path;

const CONFIG_FILE: &str = "proxy.json";

pub const ENV_BIND: &str = "TRADEPILOT_PROXY_BIND";
pub const ENV_UPSTREAM_URL: &str = "TRADEPILOT_UPSTREAM_URL";
pub const ENV_LOG_DIR: &str = "TRADEPILOT_PROXY_LOG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Backend root requests are forwarded to.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    /// Path prefix served by the proxy; stripped before forwarding.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory for daily-rolling log files (stderr only when unset).
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_bind_address() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_upstream_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_prefix() -> String {
    "/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            upstream_url: default_upstream_url(),
            prefix: default_prefix(),
            timeout_secs: default_timeout_secs(),
            log_dir: None,
        }
    }
}

impl ProxyConfig {
    pub fn load() -> Result<Self> {
        let path = config_path(CONFIG_FILE)?;
        let config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
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
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_address = bind;
        }
        if let Some(url) = lookup(ENV_UPSTREAM_URL) {
            self.upstream_url = url;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Prefix normalized to `/segment` form, or empty for the root.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}
