use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate-limit store unreachable: {0}")]
    StoreUnavailable(String),

    #[error("invalid rate-limit configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RateLimitError>;
