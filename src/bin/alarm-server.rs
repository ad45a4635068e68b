//! alarm-server: holds the shared alarm flag and serves it to the buttons
//! and checkers.

use alarm_button::cli::{execute, shutdown_signal, ServerCli};
use alarm_button::server::{run_server, ServerOptions};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = ServerCli::parse();
    let config = cli.common.load_config();

    let options = ServerOptions {
        listen_address: cli.listen_address.clone(),
        state_file: cli.state_file.clone(),
    };

    execute("alarm-server", &cli.common, config, |config| async move {
        run_server(&config, &options, shutdown_signal()).await
    })
}
