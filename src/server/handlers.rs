//! HTTP request handlers.
//!
//! This module contains the endpoint handlers of the alarm API.

use crate::error::AlarmError;
use crate::server::response::{
    AlarmStateResponse, ApiResponse, GetAlarmStateRequest, SetAlarmStateRequest,
};
use crate::server::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Set alarm state handler.
///
/// POST /api/v1/alarm/set-state
pub async fn set_alarm_state(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetAlarmStateRequest>,
) -> impl IntoResponse {
    state.increment_requests();

    let request_id = Uuid::new_v4();

    let Some(actor) = request.actor else {
        state.increment_failed();
        warn!(request_id = %request_id, "Rejected set-state request without actor");
        return error_reply(&AlarmError::invalid_argument("actor is required"));
    };

    info!(
        request_id = %request_id,
        actor = %actor,
        is_enabled = request.is_enabled,
        "Processing set-state request"
    );

    match state
        .service
        .set_alarm_state(actor, request.is_enabled)
        .await
    {
        Ok(new_state) => {
            state.increment_success();
            (
                StatusCode::OK,
                Json(ApiResponse::success(AlarmStateResponse::from(new_state))),
            )
        }
        Err(err) => {
            error!(
                request_id = %request_id,
                error = %err,
                "Set-state request failed"
            );
            state.increment_failed();
            error_reply(&AlarmError::internal("unable to persist state"))
        }
    }
}

/// Get alarm state handler.
///
/// POST /api/v1/alarm/get-state
pub async fn get_alarm_state(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GetAlarmStateRequest>,
) -> impl IntoResponse {
    state.increment_requests();

    match &request.requesting_actor {
        Some(actor) => debug!(actor = %actor, "Processing get-state request"),
        None => debug!("Processing anonymous get-state request"),
    }

    let current = state.service.get_alarm_state().await;

    state.increment_success();
    (
        StatusCode::OK,
        Json(ApiResponse::success(AlarmStateResponse::from(current))),
    )
}

/// Builds the error envelope and the HTTP status matching the error code.
fn error_reply(err: &AlarmError) -> (StatusCode, Json<ApiResponse<AlarmStateResponse>>) {
    let status = StatusCode::from_u16(err.code().http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiResponse::from_error(err)))
}
