//! alarm-button-on: raises the alarm, then shuts this machine down.

use alarm_button::button::{self, ButtonOptions};
use alarm_button::cli::{execute, shutdown_signal, ButtonOnCli};
use alarm_button::power::SystemPower;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = ButtonOnCli::parse();
    let config = cli.common.load_config();

    let options = ButtonOptions {
        server_addr: cli.server_address.clone(),
        debug: cli.debug,
        ..ButtonOptions::default()
    };

    execute("alarm-button-on", &cli.common, config, |config| async move {
        button::run(&config, &options, true, &SystemPower::new(), shutdown_signal()).await
    })
}
