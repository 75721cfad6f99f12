//! API key authentication gate
//!
//! One pass per request: derive the correlation id, extract the
//! credential, resolve it through the key store, enforce tenant and key
//! lifecycle, attach the principal to the request and journal the outcome.
//! Every failure path answers the normalized error body and appends an
//! audit entry carrying the correlation id and client ip.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use rand::RngCore;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::audit::{actions, AuditEntry};
use crate::domain::{DomainError, Principal};
use crate::infrastructure::keys::hasher::extract_key_prefix;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation id of the current request, stored in the request extensions
/// and echoed on every response and audit entry.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// 128-bit hex id for requests that arrive without one.
pub fn generate_corr_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Outermost layer on every route: accept the caller's `X-Correlation-Id`
/// or mint one, stash it in the extensions and echo it on the response.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let corr_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_corr_id);
    request
        .extensions_mut()
        .insert(CorrelationId(corr_id.clone()));

    let mut response = next.run(request).await;
    if !response.headers().contains_key(CORRELATION_HEADER) {
        if let Ok(value) = corr_id.parse() {
            response.headers_mut().insert(CORRELATION_HEADER, value);
        }
    }
    response
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let corr_id = match request.extensions().get::<CorrelationId>() {
        Some(corr) => corr.0.clone(),
        None => {
            let corr = generate_corr_id();
            request.extensions_mut().insert(CorrelationId(corr.clone()));
            corr
        }
    };

    let ip = client_ip(request.headers(), request.extensions().get::<ConnectInfo<SocketAddr>>());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let Some(raw_key) = extract_api_key(request.headers()) else {
        record_failure(&state, "", &corr_id, actions::AUTH_MISSING_KEY, &ip, &user_agent).await;
        return ApiError::auth_required(corr_id).into_response();
    };

    let (tenant, key) = match state.key_store.validate_key(&raw_key).await {
        Ok(resolved) => resolved,
        Err(err) => {
            if let Some(prefix) = extract_key_prefix(&raw_key) {
                debug!(key_prefix = prefix, corr_id, "API key validation failed");
            }
            let (action, api_err) = match err {
                DomainError::InvalidKeyFormat => (
                    actions::AUTH_INVALID_FORMAT,
                    ApiError::invalid_key("Invalid API key format", &corr_id),
                ),
                DomainError::InvalidApiKey => (
                    actions::AUTH_INVALID_KEY,
                    ApiError::invalid_key("Invalid API key", &corr_id),
                ),
                other => {
                    error!(error = %other, corr_id, "key validation errored");
                    (actions::AUTH_FAILED, ApiError::internal(&corr_id))
                }
            };
            record_failure(&state, "", &corr_id, action, &ip, &user_agent).await;
            return api_err.into_response();
        }
    };

    if !tenant.is_active() {
        record_failure(
            &state,
            tenant.id(),
            &corr_id,
            actions::AUTH_TENANT_SUSPENDED,
            &ip,
            &user_agent,
        )
        .await;
        return ApiError::tenant_suspended(corr_id).into_response();
    }

    // Defense in depth: the store filters unusable keys, but lifecycle is
    // re-checked at request time. Rotation bakes its grace window into
    // expires_at, so a rotated key inside the store's extended allowance
    // still surfaces KEY_EXPIRED here once that deadline passes.
    if key.is_expired(Utc::now()) {
        record_failure(
            &state,
            tenant.id(),
            &corr_id,
            actions::AUTH_KEY_EXPIRED,
            &ip,
            &user_agent,
        )
        .await;
        return ApiError::key_expired(corr_id).into_response();
    }
    if key.is_revoked() {
        record_failure(
            &state,
            tenant.id(),
            &corr_id,
            actions::AUTH_KEY_REVOKED,
            &ip,
            &user_agent,
        )
        .await;
        return ApiError::key_revoked(corr_id).into_response();
    }

    let principal = Principal::from_key(&key);
    request.extensions_mut().insert(principal);

    // Last-used is fire and forget; its failure never fails the request.
    let store = state.key_store.clone();
    let key_id = key.id().to_string();
    tokio::spawn(async move {
        if let Err(e) = store.update_last_used(&key_id).await {
            error!(key_id, error = %e, "failed to update last-used for API key");
        }
    });

    if state.auth_config.enable_audit {
        let entry = AuditEntry::new(tenant.id(), &corr_id, actions::AUTH_SUCCESS)
            .with_key_id(key.id())
            .with_client(&ip, &user_agent);
        if let Err(e) = state.audit_journal.append(entry).await {
            warn!(corr_id, error = %e, "audit append failed");
        }
    }

    info!(
        corr_id,
        tenant_id = tenant.id(),
        key_id = key.id(),
        key_name = key.name(),
        "authenticated request"
    );

    let mut response = next.run(request).await;
    if !response.headers().contains_key(CORRELATION_HEADER) {
        if let Ok(value) = corr_id.parse() {
            response.headers_mut().insert(CORRELATION_HEADER, value);
        }
    }
    response
}

/// Credential extraction order: `Authorization: Bearer`, `Authorization:
/// ApiKey`, a bare `Authorization` value, then `X-API-Key`.
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("ApiKey "))
            .unwrap_or(auth)
            .trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First `X-Forwarded-For` element, then `X-Real-IP`, then the socket peer.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.trim().to_string();
    }
    connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

/// Journal an authentication failure. Failures are always recorded; an
/// unattributable caller chains under the empty tenant id.
async fn record_failure(
    state: &AppState,
    tenant_id: &str,
    corr_id: &str,
    action: &str,
    ip: &str,
    user_agent: &str,
) {
    let entry = AuditEntry::new(tenant_id, corr_id, action).with_client(ip, user_agent);
    if let Err(e) = state.audit_journal.append(entry).await {
        warn!(corr_id, action, error = %e, "audit append failed");
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let corr_id = parts
            .extensions
            .get::<CorrelationId>()
            .map(|c| c.0.clone())
            .unwrap_or_default();
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::auth_required(corr_id))
    }
}

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CorrelationId>()
            .cloned()
            .unwrap_or_else(|| CorrelationId(generate_corr_id())))
    }
}
