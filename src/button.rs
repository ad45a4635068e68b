//! Alarm buttons: push a desired flag value to the server until it sticks.

use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::client::AlarmClient;
use crate::config::Config;
use crate::domain::Actor;
use crate::error::{AlarmError, Result};
use crate::power::PowerControl;
use crate::server::response::AlarmStateResponse;

/// Delay between two attempts to set the flag.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Options for a button run.
#[derive(Debug, Clone)]
pub struct ButtonOptions {
    /// Server address replacing the configured one.
    pub server_addr: Option<String>,
    /// Skip the local shutdown after raising the alarm.
    pub debug: bool,
    /// Delay between attempts.
    pub retry_interval: Duration,
}

impl Default for ButtonOptions {
    fn default() -> Self {
        Self {
            server_addr: None,
            debug: false,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Sets the alarm flag to `desired`, retrying on a fixed `retry_interval`
/// schedule until the server confirms it or `shutdown` completes.
///
/// Once a raised alarm is confirmed the local machine is shut down, unless
/// `options.debug` is set. Lowering the alarm never shuts anything down.
pub async fn push_alarm_state<F>(
    client: &AlarmClient,
    actor: &Actor,
    desired: bool,
    options: &ButtonOptions,
    power: &dyn PowerControl,
    shutdown: F,
) -> Result<AlarmStateResponse>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    info!(
        server = %client.base_url(),
        desired_state = desired,
        "Pushing desired alarm state"
    );

    let retry_interval = if options.retry_interval.is_zero() {
        DEFAULT_RETRY_INTERVAL
    } else {
        options.retry_interval
    };

    let mut ticker = tokio::time::interval(retry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut attempt: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => return Err(AlarmError::cancelled("push alarm state")),
            _ = ticker.tick() => {}
        }
        attempt += 1;

        let outcome = tokio::select! {
            _ = &mut shutdown => return Err(AlarmError::cancelled("push alarm state")),
            result = client.set_alarm_state(actor, desired) => result,
        };

        match outcome {
            Ok(response) if response.is_enabled == desired => {
                info!(attempt, state = %response.describe(), "Alarm updated");

                if desired {
                    if options.debug {
                        info!("Debug mode, skipping local shutdown");
                    } else {
                        info!("Triggering local shutdown");
                        power.shutdown().await?;
                    }
                }

                return Ok(response);
            }
            Ok(response) => {
                warn!(
                    attempt,
                    state = %response.describe(),
                    "Server reported a different alarm state, retrying"
                );
            }
            Err(e) => {
                warn!(
                    attempt,
                    transient = e.is_transient(),
                    error = %e,
                    "Failed to set alarm state, retrying"
                );
            }
        }
    }
}

/// Runs a button: resolves the server, detects the actor and pushes
/// `desired`.
pub async fn run<F>(
    config: &Config,
    options: &ButtonOptions,
    desired: bool,
    power: &dyn PowerControl,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let server_addr = options
        .server_addr
        .as_deref()
        .unwrap_or(&config.server_addr);

    let actor = Actor::detect()?;
    let client = AlarmClient::new(server_addr, config.timeout)?;

    push_alarm_state(&client, &actor, desired, options, power, shutdown).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::response::ApiResponse;
    use crate::server::state::AppState;
    use crate::server::SET_STATE_PATH;
    use crate::service::AlarmService;
    use async_trait::async_trait;
    use axum::{extract::State, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct CountingPower {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PowerControl for CountingPower {
        async fn shutdown(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn start_server() -> (String, Arc<AppState>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state = Arc::new(AppState::new(AlarmService::new(None).await.unwrap()));
        tokio::spawn(crate::server::serve(
            listener,
            state.clone(),
            std::future::pending(),
        ));
        (addr, state)
    }

    fn fast_options(debug: bool) -> ButtonOptions {
        ButtonOptions {
            server_addr: None,
            debug,
            retry_interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_button_on_shuts_down_once() {
        let (addr, state) = start_server().await;
        let client = AlarmClient::new(&addr, Duration::from_secs(2)).unwrap();
        let power = CountingPower::default();

        let response = push_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            true,
            &fast_options(false),
            &power,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert!(response.is_enabled);
        assert_eq!(power.calls.load(Ordering::SeqCst), 1);
        assert!(state.service.get_alarm_state().await.is_enabled);
    }

    #[tokio::test]
    async fn test_button_on_debug_skips_shutdown() {
        let (addr, _state) = start_server().await;
        let client = AlarmClient::new(&addr, Duration::from_secs(2)).unwrap();
        let power = CountingPower::default();

        push_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            true,
            &fast_options(true),
            &power,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(power.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_button_off_never_shuts_down() {
        let (addr, state) = start_server().await;
        state
            .service
            .set_alarm_state(Actor::new("h0", "u0"), true)
            .await
            .unwrap();

        let client = AlarmClient::new(&addr, Duration::from_secs(2)).unwrap();
        let power = CountingPower::default();

        let response = push_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            false,
            &fast_options(false),
            &power,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert!(!response.is_enabled);
        assert_eq!(response.last_actor, Some(Actor::new("h1", "u1")));
        assert_eq!(power.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_until_cancelled() {
        let client = AlarmClient::new("127.0.0.1:1", Duration::from_millis(200)).unwrap();
        let power = CountingPower::default();

        let result = push_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            true,
            &fast_options(false),
            &power,
            tokio::time::sleep(Duration::from_millis(150)),
        )
        .await;

        assert!(matches!(result, Err(AlarmError::Cancelled { .. })));
        assert_eq!(power.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_until_server_appears() {
        // Reserve a port, release it, and start the server there later.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let listener = TcpListener::bind(addr).await.unwrap();
            let state = Arc::new(AppState::new(AlarmService::new(None).await.unwrap()));
            crate::server::serve(listener, state, std::future::pending()).await
        });

        let client = AlarmClient::new(&addr.to_string(), Duration::from_secs(1)).unwrap();
        let power = CountingPower::default();

        let response = push_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            true,
            &fast_options(true),
            &power,
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await
        .unwrap();

        assert!(response.is_enabled);
        server.abort();
    }

    /// Answers every set request slowly and with the alarm still lowered.
    async fn slow_lowered(
        State(calls): State<Arc<AtomicUsize>>,
    ) -> Json<ApiResponse<AlarmStateResponse>> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        Json(ApiResponse::success(AlarmStateResponse::default()))
    }

    #[tokio::test]
    async fn test_retries_on_fixed_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(SET_STATE_PATH, post(slow_lowered))
            .with_state(calls.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move { axum::serve(listener, router).await });

        let client = AlarmClient::new(&addr, Duration::from_secs(2)).unwrap();
        let power = CountingPower::default();
        let options = ButtonOptions {
            retry_interval: Duration::from_millis(100),
            ..ButtonOptions::default()
        };

        let result = push_alarm_state(
            &client,
            &Actor::new("h1", "u1"),
            true,
            &options,
            &power,
            tokio::time::sleep(Duration::from_millis(450)),
        )
        .await;

        assert!(matches!(result, Err(AlarmError::Cancelled { .. })));
        // Attempts start every 100ms even though each one takes 80ms.
        assert!(calls.load(Ordering::SeqCst) >= 4);
        assert_eq!(power.calls.load(Ordering::SeqCst), 0);
    }
}
