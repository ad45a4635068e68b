//! alarm-updater: installs the published release for this machine's role
//! and starts its executable.

use alarm_button::cli::{execute, shutdown_signal, UpdaterCli};
use alarm_button::error::AlarmError;
use alarm_button::update::updater::{self, UpdateOutcome, UpdaterOptions};
use clap::Parser;
use std::process::ExitCode;
use tracing::info;

fn main() -> ExitCode {
    let cli = UpdaterCli::parse();
    let config = cli.common.load_config();
    let options = UpdaterOptions::new(cli.role);

    execute("alarm-updater", &cli.common, config, |config| async move {
        let working_dir = std::env::current_dir().map_err(|e| {
            AlarmError::config_with_source("Failed to resolve the working directory", e)
        })?;

        match updater::run(&config, &options, &working_dir, shutdown_signal()).await? {
            UpdateOutcome::UpToDate { version } => info!(version = %version, "Already up to date"),
            UpdateOutcome::Updated { from, to } => info!(
                from = from.as_deref().unwrap_or("none"),
                to = %to,
                "Update complete"
            ),
        }
        Ok::<(), AlarmError>(())
    })
}
