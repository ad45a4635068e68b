//! Power control: turning the local machine off.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{AlarmError, Result};

const POSIX_SHUTDOWN_ARGS: &[&str] = &["-h", "now"];
const WINDOWS_SHUTDOWN_ARGS: &[&str] = &["-s", "-f", "-t", "0"];

/// Something that can power the machine off.
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Starts an immediate shutdown. Returns once the request is issued.
    async fn shutdown(&self) -> Result<()>;
}

/// Shuts down through the operating system's `shutdown` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPower;

impl SystemPower {
    /// Creates the system power control.
    pub fn new() -> Self {
        Self
    }

    /// Returns the shutdown command line for `os` (as in
    /// `std::env::consts::OS`).
    pub fn command_for(os: &str) -> Result<(&'static str, &'static [&'static str])> {
        match os {
            "linux" | "macos" => Ok(("shutdown", POSIX_SHUTDOWN_ARGS)),
            "windows" => Ok(("shutdown.exe", WINDOWS_SHUTDOWN_ARGS)),
            other => Err(AlarmError::UnsupportedOs {
                os: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl PowerControl for SystemPower {
    async fn shutdown(&self) -> Result<()> {
        let (program, args) = Self::command_for(std::env::consts::OS)?;

        info!(program = program, args = ?args, "Shutting down the computer");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                warn!(program = program, error = %e, "Failed to run shutdown command");
                AlarmError::Io(e)
            })?;

        // Not reaped, the machine is going down.
        drop(child);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_for_supported_os() {
        let (program, args) = SystemPower::command_for("linux").unwrap();
        assert_eq!(program, "shutdown");
        assert_eq!(args, &["-h", "now"]);

        let (program, _) = SystemPower::command_for("macos").unwrap();
        assert_eq!(program, "shutdown");

        let (program, args) = SystemPower::command_for("windows").unwrap();
        assert_eq!(program, "shutdown.exe");
        assert_eq!(args, &["-s", "-f", "-t", "0"]);
    }

    #[test]
    fn test_command_for_unsupported_os() {
        let result = SystemPower::command_for("plan9");
        assert!(matches!(result, Err(AlarmError::UnsupportedOs { os }) if os == "plan9"));
    }
}
