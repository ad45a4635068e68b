//! Configuration module for alarm-button.
//!
//! All executables share one small YAML settings file. It names the alarm
//! server, the folder updates are published to, the state file used by the
//! server and the network timeout.

mod duration;
mod logging;

pub use logging::{LogFormat, LogLevel, LogOutput, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AlarmError, Result};

/// Default file name of the shared settings file.
pub const DEFAULT_CONFIG_FILENAME: &str = "alarm-button-settings.yaml";

/// Default file name of the persisted alarm state.
pub const DEFAULT_STATE_FILENAME: &str = "alarm-button-state.json";

/// Default timeout for network operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Alarm server address (`host:port`).
    #[serde(default)]
    pub server_addr: String,

    /// URL of the folder update artifacts are published to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_folder: Option<String>,

    /// Path of the JSON file holding the alarm state.
    #[serde(default)]
    pub state_file: String,

    /// Timeout for network operations and RPC calls.
    #[serde(default, with = "duration")]
    pub timeout: Duration,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Creates a configuration for the given server with defaults filled in.
    pub fn new(server_addr: impl Into<String>) -> Result<Self> {
        let mut config = Self {
            server_addr: server_addr.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILENAME`] in
    /// the current directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILENAME));
        let content = std::fs::read_to_string(path).map_err(|e| {
            AlarmError::config_with_source(
                format!("Failed to read config file '{}'", path.display()),
                e,
            )
        })?;

        Self::load_from_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| AlarmError::config_with_source("Failed to parse config", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration and writes it as YAML to `path`.
    ///
    /// On unix the file is readable by its owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut config = self.clone();
        config.validate()?;

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| AlarmError::config_with_source("Failed to serialize config", e))?;

        write_private(path, yaml.as_bytes()).map_err(|e| {
            AlarmError::config_with_source(
                format!("Failed to write config file '{}'", path.display()),
                e,
            )
        })
    }

    /// Validates required fields and fills defaults for optional ones.
    pub fn validate(&mut self) -> Result<()> {
        if self.server_addr.trim().is_empty() {
            return Err(AlarmError::config("server_addr must be provided"));
        }

        split_host_port(&self.server_addr)?;

        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }

        if self.state_file.trim().is_empty() {
            self.state_file = DEFAULT_STATE_FILENAME.to_string();
        }

        match self.update_folder.as_deref().map(str::trim) {
            None => {}
            Some("") => self.update_folder = None,
            Some(folder) => {
                reqwest::Url::parse(folder).map_err(|e| {
                    AlarmError::config_with_source(
                        format!("Invalid update folder URI '{}'", folder),
                        e,
                    )
                })?;
            }
        }

        Ok(())
    }
}

/// Splits a `host:port` address. IPv6 hosts must be bracketed
/// (`[::1]:8080`); the host may be empty (`:8080`).
pub fn split_host_port(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| AlarmError::config(format!("Invalid server address '{}': missing port", addr)))?;

    let host = if let Some(inner) = host.strip_prefix('[') {
        inner
            .strip_suffix(']')
            .ok_or_else(|| AlarmError::config(format!("Invalid server address '{}'", addr)))?
    } else if host.contains(':') {
        return Err(AlarmError::config(format!(
            "Invalid server address '{}': IPv6 hosts must be bracketed",
            addr
        )));
    } else {
        host
    };

    let port = port.parse::<u16>().map_err(|e| {
        AlarmError::config_with_source(format!("Invalid port in server address '{}'", addr), e)
    })?;

    Ok((host.to_string(), port))
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    // An existing file keeps its old mode on open.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
