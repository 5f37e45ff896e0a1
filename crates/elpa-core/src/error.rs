//! Error types for graph construction and validation.

use thiserror::Error;

/// A single structural problem found while validating a [`crate::graph::Workflow`].
///
/// Mirrors the `{path, message}` issue shape returned to callers over an
/// HTTP 400 response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    /// Dotted/indexed path to the offending field, e.g. `edges[2].source`.
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by `elpa-core` itself (graph indexing, context invariants).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("workflow failed validation")]
    InvalidWorkflow(Vec<ValidationIssue>),

    #[error("node '{0}' not found in workflow")]
    UnknownNode(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
