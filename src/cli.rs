//! Command-line interface definitions for the alarm-button executables.
//!
//! Every executable shares [`CommonArgs`] and runs its component through
//! [`execute`], which sets up logging, the runtime and the exit code.

use clap::{Args, Parser};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, warn, Instrument};

use crate::config::{Config, LogLevel};
use crate::error::{exit_code, AlarmError, Result};
use crate::update::Role;

/// Flags shared by every executable.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Path to the settings file
    #[arg(short, long, global = true, env = "ALARM_BUTTON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CommonArgs {
    /// Returns the log level requested on the command line, if any.
    pub fn log_level(&self) -> Option<LogLevel> {
        if self.quiet {
            return Some(LogLevel::Error);
        }

        match self.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }

    /// Loads the settings file named by `--config`, or the default one.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref())
    }
}

/// alarm-server - holds the shared alarm flag
#[derive(Debug, Parser)]
#[command(name = "alarm-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Address to listen on (defaults to all interfaces on the configured port)
    pub listen_address: Option<String>,

    /// JSON file the alarm state is persisted to
    #[arg(short, long)]
    pub state_file: Option<PathBuf>,
}

/// alarm-button-on - raises the alarm and shuts this machine down
#[derive(Debug, Parser)]
#[command(name = "alarm-button-on")]
#[command(author, version, about, long_about = None)]
pub struct ButtonOnCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Alarm server address (host:port)
    pub server_address: Option<String>,

    /// Do not shut this machine down
    #[arg(short, long, hide = true)]
    pub debug: bool,
}

/// alarm-button-off - lowers the alarm
#[derive(Debug, Parser)]
#[command(name = "alarm-button-off")]
#[command(author, version, about, long_about = None)]
pub struct ButtonOffCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Alarm server address (host:port)
    pub server_address: Option<String>,
}

/// alarm-checker - shuts this machine down once the alarm is raised
#[derive(Debug, Parser)]
#[command(name = "alarm-checker")]
#[command(author, version, about, long_about = None)]
pub struct CheckerCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Alarm server address (host:port)
    pub server_address: Option<String>,

    /// Log a raised alarm instead of shutting down
    #[arg(short, long, hide = true)]
    pub debug: bool,
}

/// alarm-packager - prepares a release for publishing
#[derive(Debug, Parser)]
#[command(name = "alarm-packager")]
#[command(author, version, about, long_about = None)]
pub struct PackagerCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Alarm server address written to the settings file (host:port)
    pub server_address: String,

    /// URL the release will be published to
    pub update_folder: String,
}

/// alarm-updater - installs the published release for a role
#[derive(Debug, Parser)]
#[command(name = "alarm-updater")]
#[command(author, version, about, long_about = None)]
pub struct UpdaterCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Role of this machine
    #[arg(value_parser = parse_role)]
    pub role: Role,
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}

/// Completes on SIGINT or SIGTERM (ctrl-c outside unix).
///
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Runs one executable: initialises logging from `config` and `common`,
/// builds the runtime and drives `run` to completion inside a span naming
/// `component`.
pub fn execute<F, Fut>(
    component: &'static str,
    common: &CommonArgs,
    config: Result<Config>,
    run: F,
) -> ExitCode
where
    F: FnOnce(Config) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();

    if let Err(e) = logging.init(common.log_level()) {
        eprintln!("{}", e);
        return ExitCode::from(exit_code::FAILURE);
    }

    let result = config.and_then(|config| {
        let runtime = tokio::runtime::Runtime::new().map_err(|e| {
            AlarmError::internal(format!("Failed to create async runtime: {}", e))
        })?;

        let span = tracing::info_span!("run", component);
        runtime.block_on(run(config).instrument(span))
    });

    match result {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            error!(component, error = %e, "Fatal error");
            ExitCode::from(e.exit_code())
        }
    }
}
