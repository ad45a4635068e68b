//! HTTP Server module - alarm API server implementation.
//!
//! This module provides the HTTP server for alarm-button, including
//! routing, request handling, and response formatting.

pub mod handlers;
pub mod response;
pub mod state;

#[cfg(test)]
mod handlers_tests;

use crate::config::{split_host_port, Config};
use crate::error::{AlarmError, Result};
use crate::repository::{FileStateRepository, StateRepository};
use crate::service::AlarmService;
use axum::{routing::post, Router};
use state::AppState;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Route of the set-state operation.
pub const SET_STATE_PATH: &str = "/api/v1/alarm/set-state";

/// Route of the get-state operation.
pub const GET_STATE_PATH: &str = "/api/v1/alarm/get-state";

/// Command-line overrides for the server.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Address to listen on, used as given.
    pub listen_address: Option<String>,
    /// State file replacing the configured one.
    pub state_file: Option<PathBuf>,
}

/// Creates the API router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(SET_STATE_PATH, post(handlers::set_alarm_state))
        .route(GET_STATE_PATH, post(handlers::get_alarm_state))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        // Add state
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AlarmError::internal(format!("Server error: {}", e)))?;

    info!(
        uptime_seconds = state.uptime_seconds(),
        requests_total = state.stats.snapshot().requests_total,
        "Alarm server stopped"
    );

    Ok(())
}

/// Returns the address to listen on: the override as given, otherwise every
/// interface on the port of the configured server address.
pub fn resolve_listen_address(server_addr: &str, listen_override: Option<&str>) -> Result<String> {
    if let Some(addr) = listen_override.filter(|a| !a.trim().is_empty()) {
        return Ok(addr.to_string());
    }

    let (_, port) = split_host_port(server_addr)?;
    Ok(format!("0.0.0.0:{}", port))
}

/// Loads the persisted state, binds the listener and serves until
/// `shutdown` completes.
pub async fn run_server<F>(config: &Config, options: &ServerOptions, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state_file = options
        .state_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.state_file));

    let listen_address =
        resolve_listen_address(&config.server_addr, options.listen_address.as_deref())?;

    let repository: Arc<dyn StateRepository> = Arc::new(FileStateRepository::new(&state_file));
    let service = AlarmService::new(Some(repository)).await?;
    let state = Arc::new(AppState::new(service));

    let listener = TcpListener::bind(&listen_address).await.map_err(|e| {
        AlarmError::connection_with_source(format!("listen on {}", listen_address), e)
    })?;

    info!(
        listen_address = %listen_address,
        state_file = %state_file.display(),
        "Alarm server listening"
    );

    serve(listener, state, shutdown).await
}
