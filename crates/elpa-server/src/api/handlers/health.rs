//! Liveness endpoint.

use axum::response::IntoResponse;
use serde_json::json;

use crate::api::response::ok;

pub async fn health() -> impl IntoResponse {
    ok(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
