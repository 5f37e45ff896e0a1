//! Usage-stats endpoint: a point-in-time snapshot of a teacher's quota,
//! read without consuming it.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::api::response::ok;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    #[serde(rename = "teacherId")]
    teacher_id: Option<String>,
}

pub async fn usage_stats(State(state): State<AppState>, Query(query): Query<UsageQuery>) -> ApiResult<impl IntoResponse> {
    let teacher_id = query
        .teacher_id
        .ok_or_else(|| ApiError::BadRequest("teacherId query parameter is required".to_string()))?;
    let stats = state.rate_limit.get_usage_stats(&teacher_id).await;
    Ok(ok(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::StubAiClient;
    use crate::persistence::InMemoryPersistence;
    use std::sync::Arc;

    #[tokio::test]
    async fn missing_teacher_id_is_a_bad_request() {
        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        let err = usage_stats(State(state), Query(UsageQuery { teacher_id: None })).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn reports_a_snapshot_for_a_known_teacher() {
        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        usage_stats(State(state.clone()), Query(UsageQuery { teacher_id: Some("t1".to_string()) })).await.unwrap();
        let decision = state.rate_limit.check_execution_limit("t1", None).await;
        assert!(decision.allowed);
    }
}
