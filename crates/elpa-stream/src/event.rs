//! Typed stream events and their `event: <name>\ndata: <json>\n\n` wire
//! shape.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// One thing the scheduler wants the caller to know about. Runners never
/// construct these directly — the scheduler translates a runner's return
/// value into the appropriate event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    NodeStart {
        node_id: String,
        node_type: String,
        label: Option<String>,
    },
    NodeComplete {
        node_id: String,
        output: Value,
    },
    NodeError {
        node_id: String,
        message: String,
    },
    StreamToken {
        node_id: String,
        content: String,
    },
    Progress {
        progress: f64,
        total_nodes: usize,
        completed_nodes: usize,
    },
    Complete {
        status: String,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NodeStart { .. } => "node-start",
            Self::NodeComplete { .. } => "node-complete",
            Self::NodeError { .. } => "node-error",
            Self::StreamToken { .. } => "stream-token",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::NodeStart { node_id, node_type, label } => json!({
                "nodeId": node_id, "nodeType": node_type, "label": label,
            }),
            Self::NodeComplete { node_id, output } => json!({
                "nodeId": node_id, "output": output,
            }),
            Self::NodeError { node_id, message } => json!({
                "nodeId": node_id, "message": message,
            }),
            Self::StreamToken { node_id, content } => json!({
                "nodeId": node_id, "content": content,
            }),
            Self::Progress { progress, total_nodes, completed_nodes } => json!({
                "progress": progress, "totalNodes": total_nodes, "completedNodes": completed_nodes,
            }),
            Self::Complete { status } => json!({ "status": status }),
            Self::Error { message } => json!({ "message": message }),
        }
    }

    /// `complete` and `error` close the stream; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Render as an SSE frame: `event: <name>\ndata: <json>\n\n`.
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.payload())
    }
}

/// A [`StreamEvent`] stamped with its position in the execution's total
/// order and the instant it was emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedStreamEvent {
    pub order: u64,
    pub event: StreamEvent,
    pub emitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_start_frames_as_expected() {
        let event = StreamEvent::NodeStart {
            node_id: "n1".to_string(),
            node_type: "student-profile".to_string(),
            label: Some("Profile".to_string()),
        };
        let frame = event.to_sse_frame();
        assert!(frame.starts_with("event: node-start\ndata: "));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains("\"nodeId\":\"n1\""));
    }

    #[test]
    fn complete_and_error_are_terminal() {
        assert!(StreamEvent::Complete { status: "completed".to_string() }.is_terminal());
        assert!(StreamEvent::Error { message: "boom".to_string() }.is_terminal());
        assert!(!StreamEvent::Progress { progress: 0.5, total_nodes: 2, completed_nodes: 1 }.is_terminal());
    }
}
