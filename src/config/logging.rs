//! Logging configuration types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::error::AlarmError;

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: LogLevel,

    /// Log format.
    pub format: LogFormat,

    /// Log output destination.
    pub output: LogOutput,
}

impl LoggingConfig {
    /// Installs the global tracing subscriber.
    ///
    /// `override_level` comes from the command line and wins over the
    /// configured level. `RUST_LOG`, when set, wins over both.
    pub fn init(&self, override_level: Option<LogLevel>) -> Result<(), AlarmError> {
        let level = override_level.unwrap_or(self.level);
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true);

        let result = match (self.format, self.output) {
            (LogFormat::Json, LogOutput::Stdout) => {
                builder.json().with_writer(std::io::stdout).try_init()
            }
            (LogFormat::Json, LogOutput::Stderr) => {
                builder.json().with_writer(std::io::stderr).try_init()
            }
            (LogFormat::Text, LogOutput::Stdout) => {
                builder.with_writer(std::io::stdout).try_init()
            }
            (LogFormat::Text, LogOutput::Stderr) => {
                builder.with_writer(std::io::stderr).try_init()
            }
        };

        result.map_err(|e| AlarmError::config(format!("Failed to initialize logging: {}", e)))
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level name understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(AlarmError::config(format!("Unknown log level: {}", s))),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON lines.
    Json,
}

impl FromStr for LogFormat {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            _ => Err(AlarmError::config(format!("Unknown log format: {}", s))),
        }
    }
}

/// Log output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

impl FromStr for LogOutput {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            _ => Err(AlarmError::config(format!("Unknown log output: {}", s))),
        }
    }
}
