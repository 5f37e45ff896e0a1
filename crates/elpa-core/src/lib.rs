//! Graph model, student/execution data types, and execution records for
//! the adaptive learning orchestrator.
//!
//! This crate has no opinion about how nodes are executed — see
//! `elpa-runners` for the node-runner registry and `elpa-engine` for the
//! scheduler that drives a [`graph::Workflow`] to completion.

pub mod context;
pub mod error;
pub mod graph;
pub mod record;
pub mod student;

pub use context::{ConversationTurn, ExecutionContext, Role};
pub use error::{CoreError, Result, ValidationIssue};
pub use graph::{Edge, GraphIndex, Node, Workflow, PORT_CONTINUE, PORT_FALSE, PORT_TRUE};
pub use record::{
    ErrorKind, ExecutionError, ExecutionStatus, NodeExecutionRecord, NodeStatus,
    WorkflowExecutionRecord,
};
pub use student::StudentProfile;
