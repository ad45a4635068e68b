//! Release distribution: the packager publishes a release, the updater
//! installs it on client and server machines.

pub mod lock;
pub mod manifest;
pub mod packager;
pub mod updater;

pub use lock::{UpdateLock, MARKER_FILENAME, MARKER_LIFETIME};
pub use manifest::{file_checksum, Manifest, Role, VERSION_FILENAME};

use std::future::Future;
use tracing::info;

use crate::client::AlarmClient;
use crate::config::Config;
use crate::domain::Actor;
use crate::error::{AlarmError, Result};

/// Version of this build, as written to and compared against manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Checks that the configured alarm server answers a state request.
pub(crate) async fn verify_server<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let actor = Actor::detect()?;
    let client = AlarmClient::new(&config.server_addr, config.timeout)?;

    tokio::select! {
        _ = shutdown => return Err(AlarmError::cancelled("verify alarm server")),
        result = client.get_alarm_state(&actor) => { result?; }
    }

    info!(server_address = %config.server_addr, "Verified connection to alarm server");
    Ok(())
}
