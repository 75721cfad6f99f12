//! Normalized API error responses
//!
//! Every failure answers `{code, message, corrId, retryable}` plus optional
//! extensions (conflict reason, split hint, field errors, retry-after).
//! No error body ever carries a raw credential, hash material or another
//! tenant's identifiers.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json as AxumJson,
};
use serde::{Deserialize, Serialize};

use crate::domain::export::{ConflictReason, FieldError, SplitHint};
use crate::domain::DomainError;
use crate::infrastructure::rate_limit::retry_after_secs;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthRequired,
    InvalidKey,
    KeyExpired,
    KeyRevoked,
    TenantSuspended,
    InsufficientScope,
    ValidationError,
    BadJson,
    Conflict,
    NotFound,
    RateLimited,
    RequestTooLarge,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub corr_id: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_reason: Option<ConflictReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_hint: Option<SplitHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: ErrorCode,
        message: impl Into<String>,
        corr_id: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                corr_id: corr_id.into(),
                retryable: false,
                conflict_reason: None,
                split_hint: None,
                errors: None,
                retry_after_seconds: None,
            },
        }
    }

    pub fn auth_required(corr_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::AuthRequired,
            "API key required",
            corr_id,
        )
    }

    pub fn invalid_key(message: impl Into<String>, corr_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidKey,
            message,
            corr_id,
        )
    }

    pub fn key_expired(corr_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::KeyExpired,
            "API key has expired",
            corr_id,
        )
    }

    pub fn key_revoked(corr_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::KeyRevoked,
            "API key has been revoked",
            corr_id,
        )
    }

    pub fn tenant_suspended(corr_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            ErrorCode::TenantSuspended,
            "Tenant account is suspended",
            corr_id,
        )
    }

    pub fn insufficient_scope(scope: &str, corr_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            ErrorCode::InsufficientScope,
            format!("Required scope: {scope}"),
            corr_id,
        )
    }

    pub fn validation(message: impl Into<String>, corr_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            message,
            corr_id,
        )
    }

    pub fn validation_fields(errors: Vec<FieldError>, corr_id: impl Into<String>) -> Self {
        let mut err = Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "request validation failed",
            corr_id,
        );
        err.body.errors = Some(errors);
        err
    }

    pub fn bad_json(message: impl Into<String>, corr_id: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::BadJson, message, corr_id)
    }

    pub fn conflict(reason: ConflictReason, corr_id: impl Into<String>) -> Self {
        let mut err = Self::new(
            StatusCode::CONFLICT,
            ErrorCode::Conflict,
            reason.message(),
            corr_id,
        );
        err.body.conflict_reason = Some(reason);
        err
    }

    pub fn not_found(message: impl Into<String>, corr_id: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorCode::NotFound, message, corr_id)
    }

    pub fn rate_limited(
        message: impl Into<String>,
        retry_after: Duration,
        corr_id: impl Into<String>,
    ) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RateLimited,
            message,
            corr_id,
        );
        err.body.retryable = true;
        err.body.retry_after_seconds = Some(retry_after_secs(retry_after));
        err
    }

    pub fn too_large(hint: SplitHint, corr_id: impl Into<String>) -> Self {
        let mut err = Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::RequestTooLarge,
            "result exceeds threshold; split by hint",
            corr_id,
        );
        err.body.split_hint = Some(hint);
        err
    }

    pub fn internal(corr_id: impl Into<String>) -> Self {
        let mut err = Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "internal error",
            corr_id,
        );
        err.body.retryable = true;
        err
    }

    /// Map a domain error onto the wire, attaching the request's
    /// correlation id. Messages for auth failures are fixed strings so
    /// nothing about store state leaks.
    pub fn from_domain(err: DomainError, corr_id: impl Into<String>) -> Self {
        match err {
            DomainError::InvalidKeyFormat => Self::invalid_key("Invalid API key format", corr_id),
            DomainError::InvalidApiKey => Self::invalid_key("Invalid API key", corr_id),
            DomainError::KeyExpired => Self::key_expired(corr_id),
            DomainError::KeyRevoked => Self::key_revoked(corr_id),
            DomainError::TenantSuspended => Self::tenant_suspended(corr_id),
            DomainError::NotFound { message } => Self::not_found(message, corr_id),
            DomainError::Conflict { message } => {
                Self::new(StatusCode::CONFLICT, ErrorCode::Conflict, message, corr_id)
            }
            DomainError::Validation { message } => Self::validation(message, corr_id),
            DomainError::Storage { .. } | DomainError::Internal { .. } => Self::internal(corr_id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, AxumJson(&self.body)).into_response();

        if !self.body.corr_id.is_empty() {
            if let Ok(value) = self.body.corr_id.parse() {
                response.headers_mut().insert("x-correlation-id", value);
            }
        }
        if let Some(seconds) = self.body.retry_after_seconds {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.body.code, self.body.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::AuthRequired).unwrap(),
            "\"AUTH_REQUIRED\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::RequestTooLarge).unwrap(),
            "\"REQUEST_TOO_LARGE\""
        );
    }

    #[test]
    fn test_body_shape() {
        let err = ApiError::insufficient_scope("audit:write", "corr-1");
        let json = serde_json::to_string(&err.body).unwrap();
        assert!(json.contains("\"code\":\"INSUFFICIENT_SCOPE\""));
        assert!(json.contains("\"message\":\"Required scope: audit:write\""));
        assert!(json.contains("\"corrId\":\"corr-1\""));
        assert!(json.contains("\"retryable\":false"));
        // optional extensions absent
        assert!(!json.contains("conflictReason"));
        assert!(!json.contains("splitHint"));
    }

    #[test]
    fn test_conflict_carries_reason() {
        let err = ApiError::conflict(ConflictReason::DuplicateJob, "corr-1");
        assert_eq!(err.status, StatusCode::CONFLICT);
        let json = serde_json::to_string(&err.body).unwrap();
        assert!(json.contains("\"conflictReason\":\"duplicate-job\""));
    }

    #[test]
    fn test_rate_limited_is_retryable() {
        let err = ApiError::rate_limited("too many requests", Duration::from_millis(100), "c");
        assert!(err.body.retryable);
        assert_eq!(err.body.retry_after_seconds, Some(1));
    }

    #[test]
    fn test_domain_error_mapping() {
        let err = ApiError::from_domain(DomainError::InvalidApiKey, "c");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.body.code, ErrorCode::InvalidKey);

        let err = ApiError::from_domain(DomainError::storage("disk on fire"), "c");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        // storage details never reach the client
        assert_eq!(err.body.message, "internal error");
    }
}
