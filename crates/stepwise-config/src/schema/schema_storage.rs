//! Storage, provider and logging configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::loader::ConfigLoader;

/// Where run state and session logs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    #[serde(default = "default_session_dir")]
    pub session_dir: String,
}

impl StorageConfig {
    pub fn state_path(&self) -> PathBuf {
        ConfigLoader::expand_path(&self.state_dir)
    }

    pub fn session_path(&self) -> PathBuf {
        ConfigLoader::expand_path(&self.session_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            session_dir: default_session_dir(),
        }
    }
}

fn stepwise_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stepwise")
}

fn default_state_dir() -> String {
    stepwise_home().join("state").display().to_string()
}

fn default_session_dir() -> String {
    stepwise_home().join("sessions").display().to_string()
}

/// HTTP inference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_provider_timeout() -> u64 {
    180
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for the rolling log file.
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

impl LoggingConfig {
    pub fn dir_path(&self) -> PathBuf {
        ConfigLoader::expand_path(&self.dir)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    stepwise_home().join("logs").display().to_string()
}
