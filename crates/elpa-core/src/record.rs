//! Execution records: the durable-within-a-process trail of a workflow run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::context::ExecutionContext;

/// Status of a single node visit. A loop re-entry produces a brand new
/// record rather than reusing this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One visit of one node. Owned by the enclosing [`WorkflowExecutionRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionRecord {
    pub id: String,
    pub node_id: String,
    pub node_type: String,
    pub status: NodeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub input: Value,
    pub output: Value,
    pub token_count: Option<u32>,
    pub model: Option<String>,
    pub streamed_text: Option<String>,
    pub error: Option<String>,
}

impl NodeExecutionRecord {
    pub fn new(node_id: impl Into<String>, node_type: impl Into<String>, input: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            node_type: node_type.into(),
            status: NodeStatus::Pending,
            started_at: None,
            ended_at: None,
            input,
            output: Value::Null,
            token_count: None,
            model: None,
            streamed_text: None,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = NodeStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, output: Value) {
        self.status = NodeStatus::Completed;
        self.output = output;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = NodeStatus::Failed;
        self.error = Some(message.into());
        self.ended_at = Some(Utc::now());
    }

    pub fn skip(&mut self) {
        self.status = NodeStatus::Skipped;
        self.ended_at = Some(Utc::now());
    }
}

/// Top-level status of an entire workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    AwaitingInput,
}

/// Why an execution terminated in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidWorkflow,
    RateLimited,
    RunnerFailure,
    ClientDisconnected,
    Cancelled,
    Timeout,
    AiUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
    pub node_id: Option<String>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, node_id: Option<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node_id,
        }
    }
}

/// The full record of a workflow run, created by the façade and handed to
/// terminal callbacks and to the caller on pause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionRecord {
    pub id: String,
    pub workflow_id: String,
    pub student_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub current_node: Option<String>,
    pub node_executions: Vec<NodeExecutionRecord>,
    pub context: ExecutionContext,
    pub error: Option<ExecutionError>,
}

impl WorkflowExecutionRecord {
    pub fn new(workflow_id: impl Into<String>, context: ExecutionContext) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), workflow_id, context)
    }

    /// Like [`WorkflowExecutionRecord::new`], but with a caller-assigned
    /// id — used by the HTTP layer to know an execution's id before its
    /// first event is emitted, so a `/resume` call racing the initial SSE
    /// response can still find it.
    pub fn with_id(id: impl Into<String>, workflow_id: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            student_id: context.student.id.clone(),
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            current_node: None,
            node_executions: Vec::new(),
            context,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::StudentProfile;

    #[test]
    fn node_record_lifecycle() {
        let mut record = NodeExecutionRecord::new("n1", "content-generator", Value::Null);
        assert_eq!(record.status, NodeStatus::Pending);
        record.start();
        assert_eq!(record.status, NodeStatus::Running);
        assert!(record.started_at.is_some());
        record.complete(Value::from("done"));
        assert_eq!(record.status, NodeStatus::Completed);
        assert!(record.ended_at.is_some());
    }

    #[test]
    fn workflow_record_seeds_from_context() {
        let ctx = ExecutionContext::new(StudentProfile::new("s1", "3", 2));
        let record = WorkflowExecutionRecord::new("wf1", ctx);
        assert_eq!(record.student_id, "s1");
        assert_eq!(record.status, ExecutionStatus::Pending);
        assert!(record.node_executions.is_empty());
    }
}
