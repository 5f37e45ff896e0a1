//! Engine-level errors: workflow validation failures the façade surfaces
//! before a scheduler is ever constructed. Runtime failures (a runner
//! erroring, a timeout, a cancellation) live on
//! [`elpa_core::ExecutionError`] inside the execution record instead —
//! they're part of a completed run, not a reason `execute` itself fails.

use elpa_core::ValidationIssue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow failed validation")]
    InvalidWorkflow(Vec<ValidationIssue>),
}

impl EngineError {
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::InvalidWorkflow(issues) => issues,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
