//! alarm-button-off: lowers the alarm.

use alarm_button::button::{self, ButtonOptions};
use alarm_button::cli::{execute, shutdown_signal, ButtonOffCli};
use alarm_button::power::SystemPower;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = ButtonOffCli::parse();
    let config = cli.common.load_config();

    let options = ButtonOptions {
        server_addr: cli.server_address.clone(),
        ..ButtonOptions::default()
    };

    execute("alarm-button-off", &cli.common, config, |config| async move {
        button::run(&config, &options, false, &SystemPower::new(), shutdown_signal()).await
    })
}
