//! Key lifecycle endpoints: issue, list, rotate, revoke

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::tenants::KeyWithSecret;
use crate::api::middleware::{CorrelationId, CORRELATION_HEADER};
use crate::api::state::AppState;
use crate::api::types::{json_response, ApiError, Json};
use crate::domain::api_key::{scopes, ApiKey};
use crate::domain::Principal;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    pub keys: Vec<ApiKey>,
}

/// POST /auth/keys (requires `admin:write`)
pub async fn create_key(
    State(state): State<AppState>,
    principal: Principal,
    corr: CorrelationId,
    Json(request): Json<CreateKeyRequest>,
) -> Result<Response, ApiError> {
    let corr_id = corr.0;
    if !principal.has_scope(scopes::ADMIN_WRITE) {
        return Err(ApiError::insufficient_scope(scopes::ADMIN_WRITE, corr_id));
    }

    if request.name.is_empty() {
        return Err(ApiError::validation("name is required", corr_id));
    }
    if request.scopes.is_empty() {
        return Err(ApiError::validation(
            "at least one scope is required",
            corr_id,
        ));
    }

    let expires_at = match &request.expires_at {
        Some(value) => Some(parse_expiry(value, &corr_id)?),
        None => None,
    };

    let (key, raw_key) = state
        .key_store
        .create_key(&principal.tenant_id, &request.name, request.scopes, expires_at)
        .await
        .map_err(|e| ApiError::from_domain(e, &corr_id))?;

    info!(
        corr_id,
        tenant_id = principal.tenant_id,
        key_id = key.id(),
        key_name = key.name(),
        "API key created"
    );

    Ok(json_response(
        StatusCode::CREATED,
        &corr_id,
        &KeyWithSecret {
            key: key.scrubbed(),
            raw_key,
        },
    ))
}

/// GET /auth/keys (requires `admin:read` or `admin:write`)
pub async fn list_keys(
    State(state): State<AppState>,
    principal: Principal,
    corr: CorrelationId,
) -> Result<Response, ApiError> {
    let corr_id = corr.0;
    if !principal.has_scope(scopes::ADMIN_READ) && !principal.has_scope(scopes::ADMIN_WRITE) {
        return Err(ApiError::insufficient_scope(scopes::ADMIN_READ, corr_id));
    }

    let keys = state
        .key_store
        .list_keys(&principal.tenant_id)
        .await
        .map_err(|e| ApiError::from_domain(e, &corr_id))?;

    Ok(json_response(
        StatusCode::OK,
        &corr_id,
        &ListKeysResponse { keys },
    ))
}

/// POST /auth/keys/{key_id}/rotate (requires `admin:write`)
///
/// The old key keeps verifying until the rotation grace window closes;
/// the response carries the replacement's raw secret exactly once.
pub async fn rotate_key(
    State(state): State<AppState>,
    principal: Principal,
    corr: CorrelationId,
    Path(key_id): Path<String>,
) -> Result<Response, ApiError> {
    let corr_id = corr.0;
    if !principal.has_scope(scopes::ADMIN_WRITE) {
        return Err(ApiError::insufficient_scope(scopes::ADMIN_WRITE, corr_id));
    }

    let (key, raw_key) = state
        .key_store
        .rotate_key(&principal.tenant_id, &key_id)
        .await
        .map_err(|e| ApiError::from_domain(e, &corr_id))?;

    info!(
        corr_id,
        tenant_id = principal.tenant_id,
        old_key_id = key_id,
        new_key_id = key.id(),
        "API key rotated"
    );

    Ok(json_response(
        StatusCode::OK,
        &corr_id,
        &KeyWithSecret {
            key: key.scrubbed(),
            raw_key,
        },
    ))
}

/// DELETE /auth/keys/{key_id} (requires `admin:write`); irreversible
pub async fn revoke_key(
    State(state): State<AppState>,
    principal: Principal,
    corr: CorrelationId,
    Path(key_id): Path<String>,
) -> Result<Response, ApiError> {
    let corr_id = corr.0;
    if !principal.has_scope(scopes::ADMIN_WRITE) {
        return Err(ApiError::insufficient_scope(scopes::ADMIN_WRITE, corr_id));
    }

    state
        .key_store
        .revoke_key(&principal.tenant_id, &key_id)
        .await
        .map_err(|e| ApiError::from_domain(e, &corr_id))?;

    info!(
        corr_id,
        tenant_id = principal.tenant_id,
        key_id, "API key revoked"
    );

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Ok(value) = corr_id.parse() {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    Ok(response)
}

fn parse_expiry(value: &str, corr_id: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::validation("invalid expiresAt format", corr_id))
}
