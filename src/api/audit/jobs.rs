//! Archive export endpoints: submission and job inspection

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::middleware::auth::client_ip;
use crate::api::middleware::CorrelationId;
use crate::api::state::AppState;
use crate::api::types::{json_response, ApiError, Json};
use crate::domain::api_key::scopes;
use crate::domain::audit::{actions, AuditEntry};
use crate::domain::export::{
    criteria_hash, validate_request, ExportJob, ExportRequest, FieldError, ValidationFailure,
};
use crate::domain::Principal;
use crate::infrastructure::export::EngineError;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub cancel: Option<bool>,
}

/// POST /audit/zip: scope `audit:write`, `Idempotency-Key` required
pub async fn enqueue_export(
    State(state): State<AppState>,
    principal: Principal,
    corr: CorrelationId,
    headers: HeaderMap,
    Json(request): Json<ExportRequest>,
) -> Result<Response, ApiError> {
    let corr_id = corr.0;
    let tenant_id = principal.tenant_id.clone();

    let Some(idempotency_key) = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
    else {
        return Err(ApiError::validation_fields(
            vec![FieldError::new(
                "AUDIT-REQ-010",
                "Idempotency-Key",
                "Idempotency-Key header is required",
            )],
            corr_id,
        ));
    };

    let (allowed, retry_after) = state
        .export_limiter
        .allow(&tenant_id, state.export_config.rate_per_min)
        .await;
    if !allowed {
        return Err(ApiError::rate_limited(
            "too many requests",
            retry_after,
            corr_id,
        ));
    }

    let validated = match validate_request(&request, &state.export_config) {
        Ok(validated) => validated,
        Err(ValidationFailure::Invalid(errors)) => {
            return Err(ApiError::validation_fields(errors, corr_id));
        }
        Err(ValidationFailure::RangeTooLarge(hint)) => {
            return Err(ApiError::too_large(hint, corr_id));
        }
    };

    let hash = criteria_hash(&tenant_id, &validated);
    let job = state
        .export_engine
        .enqueue(&tenant_id, &idempotency_key, &hash, validated)
        .await
        .map_err(|e| match e {
            EngineError::QueueFull { retry_after } => {
                ApiError::rate_limited("queue is full", retry_after, &corr_id)
            }
            EngineError::Conflict { reason } => ApiError::conflict(reason, &corr_id),
            EngineError::NotFound => ApiError::internal(&corr_id),
        })?;

    append_business_audit(
        &state,
        &principal,
        &corr_id,
        actions::ZIP_CREATE,
        &hash,
        &headers,
    )
    .await;

    info!(
        corr_id,
        tenant_id,
        job_id = %job.job_id,
        criteria_hash = hash,
        "audit zip job enqueued"
    );

    // Location mirrors the polling endpoint for the fresh (or replayed) job
    let location = format!("/audit/jobs/{}", job.job_id);
    let mut response = json_response(
        StatusCode::ACCEPTED,
        &corr_id,
        &decorate_job(job, &corr_id),
    );
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

/// GET /audit/jobs/{job_id}: scope `audit:read` (or `audit:write`);
/// `?cancel=true` cancels a running job and needs `audit:write`.
pub async fn get_job(
    State(state): State<AppState>,
    principal: Principal,
    corr: CorrelationId,
    Path(job_id): Path<String>,
    Query(query): Query<JobQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let corr_id = corr.0;
    let tenant_id = principal.tenant_id.clone();

    if !principal.has_scope(scopes::AUDIT_READ) && !principal.has_scope(scopes::AUDIT_WRITE) {
        return Err(ApiError::insufficient_scope(scopes::AUDIT_READ, corr_id));
    }

    // malformed ids cannot name a job; same answer as a foreign tenant's id
    let Ok(job_id) = Uuid::parse_str(&job_id) else {
        return Err(ApiError::not_found("job not found", corr_id));
    };

    let mut job = state
        .export_engine
        .get(&tenant_id, &job_id)
        .await
        .ok_or_else(|| ApiError::not_found("job not found", &corr_id))?;

    if query.cancel == Some(true) {
        if !principal.has_scope(scopes::AUDIT_WRITE) {
            return Err(ApiError::insufficient_scope(scopes::AUDIT_WRITE, corr_id));
        }
        job = state
            .export_engine
            .cancel(&tenant_id, &job_id)
            .await
            .map_err(|e| match e {
                EngineError::Conflict { reason } => ApiError::conflict(reason, &corr_id),
                _ => ApiError::not_found("job not found", &corr_id),
            })?;
        append_business_audit(
            &state,
            &principal,
            &corr_id,
            actions::ZIP_CANCEL,
            &job.criteria_hash,
            &headers,
        )
        .await;
    } else {
        append_business_audit(
            &state,
            &principal,
            &corr_id,
            actions::ZIP_GET,
            &job.criteria_hash,
            &headers,
        )
        .await;
    }

    info!(corr_id, tenant_id, job_id = %job.job_id, status = ?job.status, "audit zip job fetched");
    Ok(json_response(
        StatusCode::OK,
        &corr_id,
        &decorate_job(job, &corr_id),
    ))
}

/// Journal a business action. The domain write already happened; a failed
/// append is a logged warning, never a client-facing failure.
async fn append_business_audit(
    state: &AppState,
    principal: &Principal,
    corr_id: &str,
    action: &str,
    criteria_hash: &str,
    headers: &HeaderMap,
) {
    let entry = AuditEntry::new(&principal.tenant_id, corr_id, action)
        .with_key_id(&principal.key_id)
        .with_criteria_hash(criteria_hash)
        .with_client(client_ip(headers, None::<&ConnectInfo<SocketAddr>>), user_agent(headers));
    if let Err(e) = state.audit_journal.append(entry).await {
        warn!(corr_id, action, error = %e, "audit append failed");
    }
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn decorate_job(mut job: ExportJob, corr_id: &str) -> ExportJob {
    if let Some(error) = &mut job.error {
        error.corr_id = Some(corr_id.to_string());
    }
    job
}
