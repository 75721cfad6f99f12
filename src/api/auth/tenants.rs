//! Tenant onboarding

use axum::{extract::State, http::StatusCode, response::Response};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::middleware::CorrelationId;
use crate::api::state::AppState;
use crate::api::types::{json_response, ApiError, Json};
use crate::domain::api_key::{scopes, ApiKey};
use crate::domain::tenant::Tenant;
use crate::domain::DomainError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyWithSecret {
    pub key: ApiKey,
    pub raw_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantResponse {
    pub tenant: Tenant,
    pub initial_key: KeyWithSecret,
}

/// POST /auth/tenants
///
/// Creates the tenant together with an initial full-scope key so the
/// caller leaves onboarding with working credentials. The raw key appears
/// in this response and never again.
pub async fn create_tenant(
    State(state): State<AppState>,
    corr: CorrelationId,
    Json(request): Json<CreateTenantRequest>,
) -> Result<Response, ApiError> {
    let corr_id = corr.0;

    if request.id.is_empty() {
        return Err(ApiError::validation("id is required", corr_id));
    }
    if request.name.is_empty() {
        return Err(ApiError::validation("name is required", corr_id));
    }

    let plan = request.plan.filter(|p| !p.is_empty()).unwrap_or_else(|| "free".to_string());
    let tenant = Tenant::new(&request.id, &request.name, plan);

    state
        .tenant_store
        .create_tenant(tenant.clone())
        .await
        .map_err(|e| match e {
            DomainError::Conflict { .. } => {
                ApiError::new(
                    StatusCode::CONFLICT,
                    crate::api::types::ErrorCode::Conflict,
                    "Tenant already exists",
                    &corr_id,
                )
            }
            other => ApiError::from_domain(other, &corr_id),
        })?;

    let (key, raw_key) = state
        .key_store
        .create_key(tenant.id(), "Initial Admin Key", scopes::all(), None)
        .await
        .map_err(|e| ApiError::from_domain(e, &corr_id))?;

    info!(
        corr_id,
        tenant_id = tenant.id(),
        key_id = key.id(),
        "tenant created"
    );

    Ok(json_response(
        StatusCode::CREATED,
        &corr_id,
        &CreateTenantResponse {
            tenant,
            initial_key: KeyWithSecret {
                key: key.scrubbed(),
                raw_key,
            },
        },
    ))
}
