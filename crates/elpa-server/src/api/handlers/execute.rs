//! The execute endpoint: validates the inbound workflow, gates
//! admission through the rate limiter, and streams the run as
//! `text/event-stream` frames. The execution itself runs on a spawned
//! task so the SSE body can start draining events as soon as the first
//! one is emitted, rather than buffering the whole run before replying.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use elpa_core::{ExecutionContext, ExecutionStatus, GraphIndex, StudentProfile, ValidationIssue, Workflow};
use elpa_engine::{validate_merge_strategies, EngineError, ExecutionControl, ExecutionFacade};
use elpa_ratelimit::{RateLimitDecision, WindowLimitStatus};
use elpa_stream::{SseSink, StreamManager};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{ApiError, ApiResult};
use crate::state::{ActiveExecution, AppState};
use crate::stream_observer::StreamObserver;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub workflow: Workflow,
    pub student: StudentProfile,
    #[serde(default)]
    #[allow(dead_code)]
    pub options: Value,
}

/// `workflow.nodes` has ≥ 1 entry; every edge endpoint resolves; every
/// `select-best` merge declares a score field.
fn validate_workflow(workflow: &Workflow) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if workflow.nodes.is_empty() {
        issues.push(ValidationIssue::new("workflow.nodes", "workflow must have at least one node"));
    }
    match GraphIndex::build(workflow) {
        Ok(_) => {}
        Err(graph_issues) => issues.extend(graph_issues),
    }
    issues.extend(validate_merge_strategies(workflow));
    issues
}

fn window_for(limits: &elpa_ratelimit::ExecutionLimits, limit_type: &str) -> WindowLimitStatus {
    match limit_type {
        "hourly" => limits.classroom.clone().unwrap_or_else(|| limits.teacher.clone()),
        "burst" => limits.burst.clone(),
        _ => limits.teacher.clone(),
    }
}

fn rate_limited_error(decision: RateLimitDecision) -> ApiError {
    let limit_type = decision.limit_type.clone().unwrap_or_else(|| "daily".to_string());
    let window = window_for(&decision.limits, &limit_type);
    ApiError::RateLimited {
        limit_type: format!("{limit_type} teacher limit"),
        limit: window.limit,
        remaining: window.remaining,
        retry_after_secs: (window.reset_at - Utc::now()).num_seconds().max(0),
    }
}

pub async fn execute(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let teacher_id = headers.get("x-teacher-id").and_then(|v| v.to_str().ok()).map(str::to_string);
    let classroom_id = headers.get("x-classroom-id").and_then(|v| v.to_str().ok()).map(str::to_string);

    match &teacher_id {
        Some(tid) => {
            let decision = state.rate_limit.check_execution_limit(tid, classroom_id.as_deref()).await;
            if !decision.allowed {
                return Err(rate_limited_error(decision));
            }
        }
        None => {
            let decision = state.rate_limit.check_ip_limit(&addr.ip().to_string()).await;
            if !decision.allowed {
                return Err(ApiError::RateLimited {
                    limit_type: "ip limit".to_string(),
                    limit: decision.limit.limit,
                    remaining: decision.limit.remaining,
                    retry_after_secs: (decision.limit.reset_at - Utc::now()).num_seconds().max(0),
                });
            }
        }
    }

    let issues = validate_workflow(&request.workflow);
    if !issues.is_empty() {
        return Err(ApiError::InvalidWorkflow(issues));
    }

    let execution_id = uuid::Uuid::new_v4().to_string();
    let (sink, receiver) = SseSink::channel(state.config.sse_buffer);
    let manager = Arc::new(StreamManager::new(Arc::new(sink)));
    let control = ExecutionControl::new();

    let mut facade = ExecutionFacade::new(state.registry.clone()).with_observer(Arc::new(StreamObserver::new(manager.clone())));
    if let Some(timeout) = state.config.node_timeout() {
        facade = facade.with_node_timeout(timeout);
    }
    let facade = Arc::new(facade);

    state.active.insert(
        execution_id.clone(),
        ActiveExecution { facade: facade.clone(), stream: manager.clone(), control: control.clone() },
    );

    tokio::spawn(disconnect_watcher(manager.clone(), control.clone()));
    tokio::spawn(drive_execution(state, request.workflow, request.student, execution_id, facade, control));

    let stream = ReceiverStream::new(receiver).map(|ordered| Ok(to_sse_event(&ordered.event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &elpa_stream::StreamEvent) -> Event {
    Event::default().event(event.name()).data(event.payload().to_string())
}

async fn disconnect_watcher(manager: Arc<StreamManager>, control: ExecutionControl) {
    manager.watch_for_disconnect().await;
    control.cancel();
}

async fn drive_execution(
    state: AppState,
    workflow: Workflow,
    student: StudentProfile,
    execution_id: String,
    facade: Arc<ExecutionFacade>,
    control: ExecutionControl,
) {
    let context = ExecutionContext::new(student);
    let outcome = facade.execute_as(&workflow, context, execution_id.clone(), control).await;

    match outcome {
        Ok(record) => {
            let suspended = matches!(record.status, ExecutionStatus::AwaitingInput | ExecutionStatus::Paused);
            if !suspended {
                state.active.remove(&execution_id);
            }
            if let Err(err) = state.persistence.put_learning_session(record).await {
                tracing::warn!(%execution_id, error = %err, "failed to persist learning session");
            }
        }
        Err(EngineError::InvalidWorkflow(issues)) => {
            tracing::error!(%execution_id, ?issues, "execution rejected after admission");
            state.active.remove(&execution_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elpa_core::Node;

    #[test]
    fn validate_workflow_rejects_empty_node_list() {
        let workflow = Workflow::new("wf1", "Empty");
        let issues = validate_workflow(&workflow);
        assert!(issues.iter().any(|i| i.path == "workflow.nodes"));
    }

    #[test]
    fn validate_workflow_accepts_a_single_node() {
        let mut workflow = Workflow::new("wf1", "One node");
        workflow.nodes.push(Node::new("a", "celebration"));
        assert!(validate_workflow(&workflow).is_empty());
    }

    #[test]
    fn validate_workflow_rejects_dangling_edges() {
        let mut workflow = Workflow::new("wf1", "Dangling");
        workflow.nodes.push(Node::new("a", "celebration"));
        workflow.edges.push(elpa_core::Edge::new("a", "ghost"));
        let issues = validate_workflow(&workflow);
        assert!(issues.iter().any(|i| i.message.contains("ghost")));
    }
}
