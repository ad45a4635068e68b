//! alarm-packager: writes the settings file and the release manifest for the
//! files in the current directory.

use alarm_button::cli::{execute, shutdown_signal, PackagerCli};
use alarm_button::config::Config;
use alarm_button::error::AlarmError;
use alarm_button::update::packager::{self, PackagerOptions};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = PackagerCli::parse();

    let options = PackagerOptions {
        server_addr: cli.server_address.clone(),
        update_folder: cli.update_folder.clone(),
        config_path: cli.common.config.clone(),
    };

    execute("alarm-packager", &cli.common, Ok(Config::default()), |_| async move {
        let working_dir = std::env::current_dir().map_err(|e| {
            AlarmError::config_with_source("Failed to resolve the working directory", e)
        })?;
        packager::run(&options, &working_dir, shutdown_signal()).await?;
        Ok::<(), AlarmError>(())
    })
}
