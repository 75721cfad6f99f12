//! Scope gate
//!
//! Authorization filter over an authenticated principal. Routes attach it
//! with `middleware::from_fn(|req, next| scope::enforce(SCOPE, req, next))`;
//! handlers that accept either of two scopes check the principal directly
//! with the same semantics.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::auth::CorrelationId;
use crate::api::types::ApiError;
use crate::domain::Principal;

/// Admit the request iff the principal holds `scope` (or `*`).
pub async fn enforce(scope: &str, request: Request, next: Next) -> Response {
    let corr_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.0.clone())
        .unwrap_or_default();

    let Some(principal) = request.extensions().get::<Principal>() else {
        return ApiError::auth_required(corr_id).into_response();
    };
    if !principal.has_scope(scope) {
        return ApiError::insufficient_scope(scope, corr_id).into_response();
    }

    next.run(request).await
}
