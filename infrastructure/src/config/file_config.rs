//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("backend.url is required for the hosted backend")]
    MissingBackendUrl,

    #[error("backend.anon_key is required for the hosted backend")]
    MissingAnonKey,

    #[error("realtime.heartbeat_seconds cannot be 0")]
    InvalidHeartbeat,

    #[error("realtime.channel cannot be empty")]
    EmptyChannelName,

    #[error("output.timestamp_format is not a valid strftime format: {0}")]
    InvalidTimestampFormat(String),
}

/// Which backend adapter to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted backend-as-a-service over HTTP and websocket
    #[default]
    Hosted,
    /// In-process backend, nothing leaves the machine
    Memory,
}

/// Raw backend configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    pub kind: BackendKind,
    /// Project URL, e.g. `https://xyz.example.co`
    pub url: String,
    /// Public (anonymous) API key
    pub anon_key: String,
    /// Realtime endpoint; derived from `url` when unset
    pub realtime_url: Option<String>,
    /// One-time code accepted by the in-memory backend
    pub memory_verification_code: String,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Hosted,
            url: String::new(),
            anon_key: String::new(),
            realtime_url: None,
            memory_verification_code: "000000".to_string(),
        }
    }
}

/// Raw realtime configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRealtimeConfig {
    /// Channel name the subscription joins
    pub channel: String,
    /// Seconds between websocket heartbeats
    pub heartbeat_seconds: u64,
}

impl Default for FileRealtimeConfig {
    fn default() -> Self {
        Self {
            channel: "post-ch".to_string(),
            heartbeat_seconds: 30,
        }
    }
}

/// Raw auth configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAuthConfig {
    /// Where the session is persisted; platform data dir when unset
    pub session_file: Option<PathBuf>,
}

/// Raw output configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Enable colored terminal output
    pub color: bool,
    /// Clear the screen before each re-render
    pub clear_screen: bool,
    /// `strftime` format for post timestamps (local time)
    pub timestamp_format: String,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            clear_screen: true,
            timestamp_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

/// Complete configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub backend: FileBackendConfig,
    pub realtime: FileRealtimeConfig,
    pub auth: FileAuthConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.backend.kind == BackendKind::Hosted {
            if self.backend.url.trim().is_empty() {
                return Err(ConfigValidationError::MissingBackendUrl);
            }
            if self.backend.anon_key.trim().is_empty() {
                return Err(ConfigValidationError::MissingAnonKey);
            }
        }

        if self.realtime.heartbeat_seconds == 0 {
            return Err(ConfigValidationError::InvalidHeartbeat);
        }

        if self.realtime.channel.trim().is_empty() {
            return Err(ConfigValidationError::EmptyChannelName);
        }

        let format = &self.output.timestamp_format;
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigValidationError::InvalidTimestampFormat(
                format.clone(),
            ));
        }

        Ok(())
    }
}
