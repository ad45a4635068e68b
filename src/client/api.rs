//! Alarm HTTP client API.
//!
//! This module provides the client the button, checker, packager and updater
//! use to talk to the alarm server.

use crate::domain::Actor;
use crate::error::{AlarmError, ErrorCode, Result};
use crate::server::response::{
    AlarmStateResponse, ApiResponse, GetAlarmStateRequest, SetAlarmStateRequest,
};
use crate::server::{GET_STATE_PATH, SET_STATE_PATH};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Alarm HTTP client.
#[derive(Debug, Clone)]
pub struct AlarmClient {
    /// HTTP client.
    client: Client,
    /// Base URL of the alarm server.
    base_url: String,
    /// Deadline of every call.
    timeout: Duration,
}

impl AlarmClient {
    /// Creates a client for `server_addr` (`host:port` or a full
    /// `http(s)://` URL). Every call is bounded by `timeout`.
    pub fn new(server_addr: &str, timeout: Duration) -> Result<Self> {
        let server_addr = server_addr.trim();
        if server_addr.is_empty() {
            return Err(AlarmError::config("server address must be provided"));
        }

        let base_url = if server_addr.starts_with("http://") || server_addr.starts_with("https://")
        {
            server_addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", server_addr)
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlarmError::config_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reads the alarm state on behalf of `actor`.
    pub async fn get_alarm_state(&self, actor: &Actor) -> Result<AlarmStateResponse> {
        let request = GetAlarmStateRequest {
            requesting_actor: Some(actor.clone()),
        };
        self.call("get alarm state", GET_STATE_PATH, &request).await
    }

    /// Sets the alarm state on behalf of `actor`.
    pub async fn set_alarm_state(
        &self,
        actor: &Actor,
        is_enabled: bool,
    ) -> Result<AlarmStateResponse> {
        let request = SetAlarmStateRequest {
            actor: Some(actor.clone()),
            is_enabled,
        };
        self.call("set alarm state", SET_STATE_PATH, &request).await
    }

    /// Posts `body` to `path` and unwraps the response envelope.
    async fn call<B: Serialize>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<AlarmStateResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, operation = operation, "Sending request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        let status = response.status();
        let api_response: ApiResponse<AlarmStateResponse> =
            response.json().await.map_err(|e| {
                if e.is_timeout() {
                    self.transport_error(operation, e)
                } else {
                    AlarmError::Rpc {
                        code: ErrorCode::Internal,
                        message: format!("unreadable response (HTTP {}): {}", status, e),
                    }
                }
            })?;

        if api_response.success {
            api_response.data.ok_or_else(|| AlarmError::Rpc {
                code: ErrorCode::Internal,
                message: format!("{} response missing data", operation),
            })
        } else {
            Err(Self::extract_error(&api_response))
        }
    }

    fn transport_error(&self, operation: &str, err: reqwest::Error) -> AlarmError {
        if err.is_timeout() {
            AlarmError::Timeout {
                operation: operation.to_string(),
                millis: self.timeout.as_millis() as u64,
            }
        } else {
            AlarmError::connection_with_source(&self.base_url, err)
        }
    }

    /// Extracts an error from an API response.
    fn extract_error<T>(response: &ApiResponse<T>) -> AlarmError {
        match &response.error {
            Some(err) => AlarmError::Rpc {
                code: err.code,
                message: err.message.clone(),
            },
            None => AlarmError::Rpc {
                code: ErrorCode::Internal,
                message: "Unknown error".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AlarmClient::new("localhost:8080", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_keeps_scheme() {
        let client = AlarmClient::new("https://alarm.local:8443/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://alarm.local:8443");
    }

    #[test]
    fn test_client_requires_address() {
        let result = AlarmClient::new("  ", Duration::from_secs(5));
        assert!(matches!(result, Err(AlarmError::Config { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Port 1 on loopback refuses connections.
        let client = AlarmClient::new("127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = client
            .get_alarm_state(&Actor::new("h1", "u1"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
