//! Pause/resume/cancel/status over HTTP, dispatched against whichever
//! execution is still held open in [`crate::state::AppState::active`].

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::response::ok;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    #[serde(rename = "userAnswer")]
    pub user_answer: Value,
}

pub async fn resume_execution(State(state): State<AppState>, Path(id): Path<String>, Json(body): axum::Json<ResumeRequest>) -> ApiResult<impl IntoResponse> {
    let Some(active) = state.active.get(&id) else {
        return Err(ApiError::NotFound(format!("execution '{id}'")));
    };
    let facade = active.facade.clone();
    drop(active);

    let record = facade.resume(&id, body.user_answer).await?;
    let suspended = matches!(record.status, elpa_core::ExecutionStatus::AwaitingInput | elpa_core::ExecutionStatus::Paused);
    if !suspended {
        state.active.remove(&id);
    }
    let _ = state.persistence.put_learning_session(record.clone()).await;
    Ok(ok(record))
}

pub async fn pause_execution(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let Some(active) = state.active.get(&id) else {
        return Err(ApiError::NotFound(format!("execution '{id}'")));
    };
    active.control.request_pause();
    Ok(ok(json!({ "executionId": id, "pauseRequested": true })))
}

pub async fn cancel_execution(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let Some(active) = state.active.get(&id) else {
        return Err(ApiError::NotFound(format!("execution '{id}'")));
    };
    active.control.cancel();
    Ok(ok(json!({ "executionId": id, "cancelled": true })))
}

pub async fn get_execution_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let active_facade = state.active.get(&id).map(|active| active.facade.clone());
    if let Some(facade) = active_facade {
        if let Some(record) = facade.peek_record(&id).await {
            return Ok(ok(record));
        }
    }
    let record = state.persistence.get_learning_session(&id).await?;
    Ok(ok(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::StubAiClient;
    use crate::persistence::InMemoryPersistence;
    use std::sync::Arc;

    #[tokio::test]
    async fn resume_on_unknown_execution_is_not_found() {
        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        let err = resume_execution(State(state), Path("missing".to_string()), Json(ResumeRequest { user_answer: json!("x") }))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn pause_on_unknown_execution_is_not_found() {
        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        let err = pause_execution(State(state), Path("missing".to_string())).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn status_on_unknown_execution_is_not_found() {
        let state = AppState::new(Default::default(), Arc::new(StubAiClient), InMemoryPersistence::shared());
        let err = get_execution_status(State(state), Path("missing".to_string())).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
