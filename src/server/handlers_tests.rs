//! Tests for HTTP request handlers.

#[cfg(test)]
mod tests {
    use crate::domain::{Actor, State};
    use crate::error::{AlarmError, ErrorCode, Result};
    use crate::repository::StateRepository;
    use crate::server::handlers::{get_alarm_state, set_alarm_state};
    use crate::server::response::{AlarmStateResponse, ApiResponse};
    use crate::server::state::AppState;
    use crate::service::AlarmService;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::post,
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Repository that starts empty and refuses every save.
    struct ReadOnlyRepository;

    #[async_trait]
    impl StateRepository for ReadOnlyRepository {
        async fn load(&self) -> Result<State> {
            Err(AlarmError::StateNotFound {
                path: "read-only.json".into(),
            })
        }

        async fn save(&self, _state: &State) -> Result<()> {
            Err(AlarmError::Persistence {
                message: "read-only file system".to_string(),
                source: None,
            })
        }
    }

    async fn create_test_state() -> Arc<AppState> {
        Arc::new(AppState::new(AlarmService::new(None).await.unwrap()))
    }

    fn create_test_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/v1/alarm/set-state", post(set_alarm_state))
            .route("/api/v1/alarm/get-state", post(get_alarm_state))
            .with_state(state)
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_body(response: axum::response::Response) -> ApiResponse<AlarmStateResponse> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_state_endpoint() {
        let state = create_test_state().await;
        let app = create_test_router(state.clone());

        let request = json_request(
            "/api/v1/alarm/get-state",
            r#"{"requesting_actor": {"hostname": "h1", "username": "u1"}}"#,
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_body(response).await;
        assert!(body.success);
        assert!(!body.data.unwrap().is_enabled);
        assert_eq!(state.stats.snapshot().requests_success, 1);
    }

    #[tokio::test]
    async fn test_set_state_endpoint() {
        let state = create_test_state().await;
        let app = create_test_router(state.clone());

        let request = json_request(
            "/api/v1/alarm/set-state",
            r#"{"actor": {"hostname": "h1", "username": "u1"}, "is_enabled": true}"#,
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let data = read_body(response).await.data.unwrap();
        assert!(data.is_enabled);
        assert_eq!(data.last_actor, Some(Actor::new("h1", "u1")));
        assert!(data.timestamp.is_some());

        let current = state.service.get_alarm_state().await;
        assert_eq!(AlarmStateResponse::from(current), data);
    }

    #[tokio::test]
    async fn test_set_state_without_actor() {
        let state = create_test_state().await;
        let before = state.service.get_alarm_state().await;
        let app = create_test_router(state.clone());

        let request = json_request("/api/v1/alarm/set-state", r#"{"is_enabled": true}"#);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = read_body(response).await;
        assert!(!body.success);
        let error = body.error.unwrap();
        assert_eq!(error.code, ErrorCode::InvalidArgument);
        assert_eq!(error.message, "actor is required");

        assert_eq!(state.service.get_alarm_state().await, before);
        assert_eq!(state.stats.snapshot().requests_failed, 1);
    }

    #[tokio::test]
    async fn test_set_state_persistence_failure() {
        let service = AlarmService::new(Some(Arc::new(ReadOnlyRepository)))
            .await
            .unwrap();
        let state = Arc::new(AppState::new(service));
        let app = create_test_router(state.clone());

        let request = json_request(
            "/api/v1/alarm/set-state",
            r#"{"actor": {"hostname": "h1", "username": "u1"}, "is_enabled": true}"#,
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let error = read_body(response).await.error.unwrap();
        assert_eq!(error.code, ErrorCode::Internal);
        assert_eq!(error.message, "unable to persist state");

        assert!(!state.service.get_alarm_state().await.is_enabled);
    }

    #[tokio::test]
    async fn test_set_state_malformed_body() {
        let state = create_test_state().await;
        let app = create_test_router(state);

        let request = json_request("/api/v1/alarm/set-state", "not json");

        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
