//! Top-level API error type: wraps workflow validation failures, rate-limit
//! denials, and persistence misses behind one `IntoResponse` impl.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use elpa_core::ValidationIssue;
use elpa_engine::EngineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generic error body for every endpoint except the rate-limit 429 (which
/// has its own shape below).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

/// `{error, message, limitType, limit, remaining, retryAfter?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "limitType")]
    pub limit_type: String,
    pub limit: u64,
    pub remaining: u64,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("workflow failed validation")]
    InvalidWorkflow(Vec<ValidationIssue>),

    #[error("rate limit exceeded: {limit_type}")]
    RateLimited {
        limit_type: String,
        limit: u64,
        remaining: u64,
        retry_after_secs: i64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidWorkflow(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidWorkflow(_) => "INVALID_WORKFLOW",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidWorkflow(_) => "InvalidWorkflow",
            Self::RateLimited { .. } => "RateLimited",
            Self::NotFound(_) => "NotFound",
            Self::BadRequest(_) => "BadRequest",
            Self::InternalError(_) => "InternalError",
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidWorkflow(issues) => Self::InvalidWorkflow(issues),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let Self::RateLimited { limit_type, limit, remaining, retry_after_secs } = &self {
            tracing::warn!(limit_type, "execution denied by rate limiter");
            let body = RateLimitErrorResponse {
                error: self.error_type().to_string(),
                message: self.to_string(),
                limit_type: limit_type.clone(),
                limit: *limit,
                remaining: *remaining,
                retry_after: Some(*retry_after_secs),
            };
            let mut response = (status, Json(body)).into_response();
            if let Ok(value) = retry_after_secs.max(0).to_string().parse() {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
            return response;
        }

        let issues = match &self {
            Self::InvalidWorkflow(issues) => issues.clone(),
            _ => Vec::new(),
        };
        let body = ApiErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            code: self.code().to_string(),
            issues,
        };

        tracing::error!(code = body.code, message = %body.message, "api error");
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_workflow_maps_to_400() {
        let err = ApiError::InvalidWorkflow(vec![ValidationIssue::new("nodes[0]", "bad kind")]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_WORKFLOW");
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = ApiError::RateLimited { limit_type: "daily".to_string(), limit: 500, remaining: 0, retry_after_secs: 30 };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code(), "RATE_LIMITED");
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::NotFound("execution".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
