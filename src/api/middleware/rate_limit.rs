//! Per-principal admission control
//!
//! Applied after the auth gate: one token bucket per key id, with the
//! key's own rate-limit override when set. Denials carry a whole-second
//! `Retry-After`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::auth::CorrelationId;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::Principal;

pub async fn throttle(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(principal) = request.extensions().get::<Principal>().cloned() else {
        // nothing to meter; the auth gate owns the 401
        return next.run(request).await;
    };
    let corr_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.0.clone())
        .unwrap_or_default();

    let rate = principal
        .rate_limit
        .unwrap_or(state.auth_config.rate_per_min);
    let (allowed, retry_after) = state.auth_limiter.allow(&principal.key_id, rate).await;
    if !allowed {
        return ApiError::rate_limited("too many requests", retry_after, corr_id).into_response();
    }

    next.run(request).await
}
