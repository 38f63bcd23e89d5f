//! Monitor configuration
//!
//! Connection parameters and timing knobs, stored as JSON. Every field has a
//! default so partial files load.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::liveness::{DEFAULT_CHECK_INTERVAL, DEFAULT_DISCONNECT_THRESHOLD};
use crate::protocol::{LinkSettings, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};
use crate::supervisor::{Backoff, ExponentialBackoff, FixedBackoff, DEFAULT_RETRY_BACKOFF};

/// Configuration file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Errors loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file is not valid config JSON
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(windows)]
fn default_port() -> String {
    "COM13".to_string()
}

#[cfg(not(windows))]
fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_disconnect_threshold_ms() -> u64 {
    DEFAULT_DISCONNECT_THRESHOLD.as_millis() as u64
}

fn default_liveness_interval_ms() -> u64 {
    DEFAULT_CHECK_INTERVAL.as_millis() as u64
}

fn default_display_interval_ms() -> u64 {
    50
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF.as_millis() as u64
}

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Serial port name
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on one read, in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Silence after which the device counts as disconnected
    #[serde(default = "default_disconnect_threshold_ms")]
    pub disconnect_threshold_ms: u64,

    /// Liveness check cadence
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,

    /// Display refresh cadence
    #[serde(default = "default_display_interval_ms")]
    pub display_interval_ms: u64,

    /// Wait after a failed open
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Cap for the retry wait; equal to `retry_backoff_ms` means fixed backoff
    #[serde(default = "default_retry_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            disconnect_threshold_ms: default_disconnect_threshold_ms(),
            liveness_interval_ms: default_liveness_interval_ms(),
            display_interval_ms: default_display_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl MonitorConfig {
    /// Default config file location, e.g. `~/.config/motorlink/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("motorlink").join(CONFIG_FILE_NAME))
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from a JSON file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    /// Connection parameters for the link session
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    /// Silence after which the device counts as disconnected
    pub fn disconnect_threshold(&self) -> Duration {
        Duration::from_millis(self.disconnect_threshold_ms)
    }

    /// Liveness check cadence
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    /// Status display cadence
    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    /// Retry strategy described by the backoff fields
    pub fn backoff(&self) -> Box<dyn Backoff> {
        let initial = Duration::from_millis(self.retry_backoff_ms);
        if self.max_backoff_ms <= self.retry_backoff_ms {
            Box::new(FixedBackoff::new(initial))
        } else {
            Box::new(ExponentialBackoff::new(
                initial,
                Duration::from_millis(self.max_backoff_ms),
            ))
        }
    }
}
