use thiserror::Error;

/// A node runner's failure, bounded so the engine never leaks internal
/// detail (stack traces, provider payloads) across the stream boundary.
#[derive(Debug, Error, Clone)]
pub enum RunnerError {
    #[error("runner failed: {0}")]
    Failed(String),

    #[error("runner received invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("AI collaborator unavailable: {0}")]
    AiUnavailable(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
