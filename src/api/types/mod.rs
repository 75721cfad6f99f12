//! Wire types shared across handlers

pub mod error;
pub mod json;

pub use error::{ApiError, ErrorBody, ErrorCode};
pub use json::Json;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A JSON response carrying the correlation id header.
pub fn json_response<T: Serialize>(status: StatusCode, corr_id: &str, value: &T) -> Response {
    let mut response = (status, axum::Json(value)).into_response();
    if !corr_id.is_empty() {
        if let Ok(header_value) = corr_id.parse() {
            response.headers_mut().insert("x-correlation-id", header_value);
        }
    }
    response
}
