//! alarm-checker: polls the alarm flag and shuts this machine down once it
//! is raised.

use alarm_button::checker::{self, CheckerExit, CheckerOptions};
use alarm_button::cli::{execute, shutdown_signal, CheckerCli};
use alarm_button::error::AlarmError;
use alarm_button::power::SystemPower;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;

fn main() -> ExitCode {
    let cli = CheckerCli::parse();
    let config = cli.common.load_config();

    let options = CheckerOptions {
        server_addr: cli.server_address.clone(),
        debug: cli.debug,
        ..CheckerOptions::default()
    };

    execute("alarm-checker", &cli.common, config, |config| async move {
        match checker::run(&config, &options, &SystemPower::new(), shutdown_signal()).await? {
            CheckerExit::ShutdownInitiated => info!("Checker finished after shutdown"),
            CheckerExit::Cancelled => info!("Checker stopped"),
        }
        Ok::<(), AlarmError>(())
    })
}
