//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;

/// How backend channel numbers are shifted when several providers are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OffsetScheme {
    /// Every provider gets the same +1000 once more than one is enabled
    #[default]
    Flat,
    /// 1000 × zero-based position among enabled providers
    PerPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub backend_host: String,
    #[serde(default = "default_port")]
    pub backend_port: u16,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub offset_scheme: OffsetScheme,
    // Host version the inspection binary pretends to run under
    #[serde(default = "default_host_version")]
    pub host_version_major: u32,
}

fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 7777 }
fn default_max_retries() -> u32 { 10 }
fn default_retry_delay() -> u64 { 2000 }
fn default_connect_timeout() -> u64 { 10 }
fn default_read_timeout() -> u64 { 30 }
fn default_user_agent() -> String { format!("UltimatePVR/{}", env!("CARGO_PKG_VERSION")) }
fn default_host_version() -> u32 { 22 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_host: default_host(),
            backend_port: default_port(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            user_agent: default_user_agent(),
            offset_scheme: OffsetScheme::Flat,
            host_version_major: default_host_version(),
        }
    }
}

/// Value of a setting pushed by the host
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Str(String),
    Int(i64),
}

/// Answer to a settings change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingStatus {
    Ok,
    NeedRestart,
}

impl AppConfig {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("ultimate_pvr");
        path.push("config.json");
        path
    }

    /// Load from the per-user config directory, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => warn!("Ignoring malformed config {}: {}", path.display(), e),
                },
                Err(e) => warn!("Cannot read config {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Base URL of the backend REST API
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.backend_host, self.backend_port)
    }

    /// Apply a setting change pushed by the host. Connectivity settings are
    /// only picked up by a fresh adapter, so they ask for a restart.
    pub fn apply_setting(&mut self, name: &str, value: &SettingValue) -> SettingStatus {
        debug!("Setting changed: {}", name);

        match (name, value) {
            ("backend_url", SettingValue::Str(host)) => {
                self.backend_host = host.clone();
                info!("Backend URL changed to: {}", self.backend_host);
                SettingStatus::NeedRestart
            }
            ("backend_port", SettingValue::Int(port)) => match u16::try_from(*port) {
                Ok(port) => {
                    self.backend_port = port;
                    info!("Backend port changed to: {}", port);
                    SettingStatus::NeedRestart
                }
                Err(_) => {
                    warn!("Ignoring out-of-range backend port {}", port);
                    SettingStatus::Ok
                }
            },
            _ => SettingStatus::Ok,
        }
    }
}
