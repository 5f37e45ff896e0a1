//! Bridges the engine's [`ExecutionObserver`] callback surface onto a
//! [`StreamManager`], translating each callback into the matching
//! [`StreamEvent`] and emitting it over the execution's SSE sink.

use std::sync::Arc;

use async_trait::async_trait;
use elpa_core::{ExecutionStatus, Node, WorkflowExecutionRecord};
use elpa_engine::ExecutionObserver;
use elpa_stream::{StreamEvent, StreamManager};
use serde_json::Value;

pub struct StreamObserver {
    manager: Arc<StreamManager>,
}

impl StreamObserver {
    pub fn new(manager: Arc<StreamManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ExecutionObserver for StreamObserver {
    async fn on_node_start(&self, node_id: &str, node: &Node) {
        self.manager
            .emit(StreamEvent::NodeStart {
                node_id: node_id.to_string(),
                node_type: node.kind.clone(),
                label: node.label.clone(),
            })
            .await;
    }

    async fn on_node_complete(&self, node_id: &str, output: &Value) {
        self.manager
            .emit(StreamEvent::NodeComplete { node_id: node_id.to_string(), output: output.clone() })
            .await;
    }

    async fn on_node_error(&self, node_id: &str, message: &str) {
        self.manager
            .emit(StreamEvent::NodeError { node_id: node_id.to_string(), message: message.to_string() })
            .await;
    }

    async fn on_progress(&self, progress: f64, total_nodes: usize, completed_nodes: usize) {
        self.manager.emit(StreamEvent::Progress { progress, total_nodes, completed_nodes }).await;
    }

    async fn on_stream_token(&self, node_id: &str, content: &str) {
        self.manager
            .emit(StreamEvent::StreamToken { node_id: node_id.to_string(), content: content.to_string() })
            .await;
    }

    async fn on_execution_complete(&self, record: &WorkflowExecutionRecord) {
        let event = match record.status {
            ExecutionStatus::Failed => StreamEvent::Error {
                message: record.error.as_ref().map(|e| e.message.clone()).unwrap_or_else(|| "execution failed".to_string()),
            },
            status => StreamEvent::Complete { status: status_name(status).to_string() },
        };
        self.manager.emit(event).await;
    }
}

fn status_name(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Running => "running",
        ExecutionStatus::Paused => "paused",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::AwaitingInput => "awaiting-input",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elpa_core::{ExecutionContext, StudentProfile};
    use elpa_stream::RecordingSink;

    #[tokio::test]
    async fn node_start_forwards_as_stream_event() {
        let sink = Arc::new(RecordingSink::new());
        let manager = Arc::new(StreamManager::new(sink.clone()));
        let observer = StreamObserver::new(manager);

        observer.on_node_start("n1", &Node::new("n1", "celebration")).await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.name(), "node-start");
    }

    #[tokio::test]
    async fn completed_execution_emits_complete_event() {
        let sink = Arc::new(RecordingSink::new());
        let manager = Arc::new(StreamManager::new(sink.clone()));
        let observer = StreamObserver::new(manager);

        let record = WorkflowExecutionRecord::new("wf1", ExecutionContext::new(StudentProfile::new("s1", "3", 2)));
        observer.on_execution_complete(&record).await;

        let events = sink.events();
        assert_eq!(events[0].event.name(), "complete");
    }

    #[tokio::test]
    async fn failed_execution_emits_error_event() {
        let sink = Arc::new(RecordingSink::new());
        let manager = Arc::new(StreamManager::new(sink.clone()));
        let observer = StreamObserver::new(manager);

        let mut record = WorkflowExecutionRecord::new("wf1", ExecutionContext::new(StudentProfile::new("s1", "3", 2)));
        record.status = ExecutionStatus::Failed;
        record.error = Some(elpa_core::ExecutionError::new(elpa_core::ErrorKind::RunnerFailure, "boom", Some("n1".to_string())));
        observer.on_execution_complete(&record).await;

        let events = sink.events();
        assert_eq!(events[0].event.name(), "error");
    }
}
