//! API route definitions.

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers;
use crate::api::middleware::{cors_layer, logging_layer};
use crate::state::AppState;

/// Build the complete API router: the streaming execute endpoint plus the
/// pause/resume/cancel/status/usage surface over HTTP.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/execute", post(handlers::execute))
        .route("/api/v1/executions/:id", get(handlers::get_execution_status))
        .route("/api/v1/executions/:id/resume", post(handlers::resume_execution))
        .route("/api/v1/executions/:id/pause", post(handlers::pause_execution))
        .route("/api/v1/executions/:id/cancel", post(handlers::cancel_execution))
        .route("/api/v1/rate-limit/usage", get(handlers::usage_stats))
        .layer(cors_layer())
        .layer(logging_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::StubAiClient;
    use crate::persistence::InMemoryPersistence;
    use crate::state::AppState;
    use std::sync::Arc;

    #[test]
    fn router_builds_without_panicking() {
        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        let _router = create_router(state);
    }

    #[tokio::test]
    async fn execute_endpoint_streams_a_linear_workflow() {
        use axum::body::Body;
        use axum::extract::connect_info::MockConnectInfo;
        use axum::http::{Request, StatusCode};
        use std::net::SocketAddr;
        use tower::ServiceExt;

        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        let app = create_router(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));

        let mut workflow = elpa_core::Workflow::new("wf1", "Celebrate");
        workflow.nodes.push(elpa_core::Node::new("a", "celebration"));
        let payload = serde_json::json!({
            "workflow": workflow,
            "student": { "id": "s1", "gradeLevel": "3", "nativeLanguage": "en", "elpaLevel": 3 },
        });

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/execute")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");
    }

    #[tokio::test]
    async fn execute_endpoint_rejects_an_empty_workflow_with_400() {
        use axum::body::Body;
        use axum::extract::connect_info::MockConnectInfo;
        use axum::http::{Request, StatusCode};
        use std::net::SocketAddr;
        use tower::ServiceExt;

        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        let app = create_router(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));

        let workflow = elpa_core::Workflow::new("wf1", "Empty");
        let payload = serde_json::json!({
            "workflow": workflow,
            "student": { "id": "s1", "gradeLevel": "3", "nativeLanguage": "en", "elpaLevel": 3 },
        });

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/execute")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
