//! Checker daemon: polls the alarm flag and powers the machine off once it
//! is raised.

use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::client::AlarmClient;
use crate::config::Config;
use crate::domain::Actor;
use crate::error::Result;
use crate::power::PowerControl;

/// Delay between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Options for a checker run.
#[derive(Debug, Clone)]
pub struct CheckerOptions {
    /// Server address replacing the configured one.
    pub server_addr: Option<String>,
    /// Log a raised alarm instead of shutting down.
    pub debug: bool,
    /// Delay between polls.
    pub poll_interval: Duration,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            server_addr: None,
            debug: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why the checker stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerExit {
    /// The alarm was raised and the shutdown command was issued.
    ShutdownInitiated,
    /// The cancellation future completed.
    Cancelled,
}

/// Polls the alarm state right away and then every `poll_interval` until the
/// machine is shut down or `shutdown` completes.
pub async fn poll_alarm_state<F>(
    client: &AlarmClient,
    actor: &Actor,
    options: &CheckerOptions,
    power: &dyn PowerControl,
    shutdown: F,
) -> Result<CheckerExit>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let poll_interval = if options.poll_interval.is_zero() {
        DEFAULT_POLL_INTERVAL
    } else {
        options.poll_interval
    };

    info!(
        server = %client.base_url(),
        interval_ms = poll_interval.as_millis() as u64,
        debug = options.debug,
        "Polling alarm state"
    );

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Cancelled, exiting");
                return Ok(CheckerExit::Cancelled);
            }
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = &mut shutdown => {
                info!("Cancelled, exiting");
                return Ok(CheckerExit::Cancelled);
            }
            result = client.get_alarm_state(actor) => result,
        };

        let state = match outcome {
            Ok(state) => state,
            Err(e) => {
                warn!(transient = e.is_transient(), error = %e, "Failed to read alarm state");
                continue;
            }
        };

        info!(state = %state.describe(), "Alarm state");

        if !state.is_enabled {
            continue;
        }

        if options.debug {
            info!("Alarm enabled but debug mode prevents shutdown");
            continue;
        }

        info!("Alarm enabled, initiating shutdown");
        match power.shutdown().await {
            Ok(()) => {
                info!("Shutdown initiated, exiting");
                return Ok(CheckerExit::ShutdownInitiated);
            }
            Err(e) => error!(error = %e, "Shutdown failed"),
        }
    }
}

/// Runs the checker: resolves the server, detects the actor and polls.
pub async fn run<F>(
    config: &Config,
    options: &CheckerOptions,
    power: &dyn PowerControl,
    shutdown: F,
) -> Result<CheckerExit>
where
    F: Future<Output = ()>,
{
    let server_addr = options
        .server_addr
        .as_deref()
        .unwrap_or(&config.server_addr);

    let actor = Actor::detect()?;
    let client = AlarmClient::new(server_addr, config.timeout)?;

    poll_alarm_state(&client, &actor, options, power, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlarmError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Power control that always fails.
    #[derive(Default)]
    struct FailingPower {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PowerControl for FailingPower {
        async fn shutdown(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AlarmError::UnsupportedOs {
                os: "test".to_string(),
            })
        }
    }

    #[test]
    fn test_default_options() {
        let options = CheckerOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(5));
        assert!(!options.debug);
        assert!(options.server_addr.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_keeps_polling_until_cancelled() {
        let client = AlarmClient::new("127.0.0.1:1", Duration::from_millis(100)).unwrap();
        let power = FailingPower::default();
        let options = CheckerOptions {
            poll_interval: Duration::from_millis(20),
            ..CheckerOptions::default()
        };

        let exit = poll_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            &options,
            &power,
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await
        .unwrap();

        assert_eq!(exit, CheckerExit::Cancelled);
        assert_eq!(power.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_failure_keeps_polling() {
        use crate::server::state::AppState;
        use crate::service::AlarmService;
        use std::sync::Arc;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state = Arc::new(AppState::new(AlarmService::new(None).await.unwrap()));
        state
            .service
            .set_alarm_state(Actor::new("h0", "u0"), true)
            .await
            .unwrap();
        tokio::spawn(crate::server::serve(
            listener,
            state,
            std::future::pending(),
        ));

        let client = AlarmClient::new(&addr, Duration::from_secs(1)).unwrap();
        let power = FailingPower::default();
        let options = CheckerOptions {
            poll_interval: Duration::from_millis(20),
            ..CheckerOptions::default()
        };

        let exit = poll_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            &options,
            &power,
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap();

        assert_eq!(exit, CheckerExit::Cancelled);
        assert!(power.calls.load(Ordering::SeqCst) >= 2);
    }
}
