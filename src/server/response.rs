//! API request and response types.
//!
//! Every endpoint answers with the same [`ApiResponse`] envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Actor, State};
use crate::error::{AlarmError, ErrorResponse};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error information (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed response with an error.
    pub fn error(error: ErrorResponse) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed response from an AlarmError.
    pub fn from_error(err: &AlarmError) -> ApiResponse<T> {
        Self::error(ErrorResponse::new(err.code(), err.public_message()))
    }
}

/// Body of `POST /api/v1/alarm/set-state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetAlarmStateRequest {
    /// Who is changing the flag. Required.
    #[serde(default)]
    pub actor: Option<Actor>,
    /// New value of the flag.
    #[serde(default)]
    pub is_enabled: bool,
}

/// Body of `POST /api/v1/alarm/get-state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetAlarmStateRequest {
    /// Who is asking. Only used for logging.
    #[serde(default)]
    pub requesting_actor: Option<Actor>,
}

/// Alarm state as returned by both endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmStateResponse {
    /// When the flag was last changed.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Who changed the flag last.
    #[serde(default)]
    pub last_actor: Option<Actor>,
    /// Whether the alarm is raised.
    #[serde(default)]
    pub is_enabled: bool,
}

impl From<State> for AlarmStateResponse {
    fn from(state: State) -> Self {
        Self {
            timestamp: state.timestamp,
            last_actor: state.last_actor,
            is_enabled: state.is_enabled,
        }
    }
}

impl From<AlarmStateResponse> for State {
    fn from(response: AlarmStateResponse) -> Self {
        Self {
            timestamp: response.timestamp,
            last_actor: response.last_actor,
            is_enabled: response.is_enabled,
        }
    }
}

impl AlarmStateResponse {
    /// Renders the state for log lines.
    pub fn describe(&self) -> String {
        State::from(self.clone()).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_api_response_success() {
        let response: ApiResponse<String> = ApiResponse::success("test data".to_string());

        assert!(response.success);
        assert_eq!(response.data, Some("test data".to_string()));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let error = ErrorResponse::new(ErrorCode::InvalidArgument, "actor is required");
        let response: ApiResponse<String> = ApiResponse::error(error);

        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error.unwrap().code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_api_response_from_error() {
        let err = AlarmError::internal("boom");
        let response: ApiResponse<AlarmStateResponse> = ApiResponse::from_error(&err);

        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::Internal);
        assert_eq!(error.message, "boom");
    }

    #[test]
    fn test_set_request_without_actor() {
        let request: SetAlarmStateRequest = serde_json::from_str(r#"{"is_enabled": true}"#).unwrap();
        assert!(request.actor.is_none());
        assert!(request.is_enabled);
    }

    #[test]
    fn test_get_request_empty_body() {
        let request: GetAlarmStateRequest = serde_json::from_str("{}").unwrap();
        assert!(request.requesting_actor.is_none());
    }

    #[test]
    fn test_state_response_wire_format() {
        let response = AlarmStateResponse {
            timestamp: None,
            last_actor: Some(Actor::new("h1", "u1")),
            is_enabled: true,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["last_actor"]["hostname"], "h1");
        assert_eq!(json["last_actor"]["username"], "u1");
        assert_eq!(json["is_enabled"], true);
        assert!(json["timestamp"].is_null());
    }

    #[test]
    fn test_state_conversion() {
        let state = State::changed_by(Actor::new("h1", "u1"), true);
        let response = AlarmStateResponse::from(state.clone());

        assert_eq!(State::from(response.clone()), state);
        assert_eq!(response.describe(), state.describe());
    }
}
