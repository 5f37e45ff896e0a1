//! Plain JSON response helpers for the non-streaming endpoints.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(SuccessResponse::new(data)))
}

pub fn accepted<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(SuccessResponse::new(data)))
}
