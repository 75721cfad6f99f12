//! Application state for shared services

use std::sync::Arc;

use crate::config::{AuthConfig, ExportConfig};
use crate::domain::api_key::ApiKeyStore;
use crate::domain::audit::AuditJournal;
use crate::domain::tenant::TenantStore;
use crate::infrastructure::export::ExportEngine;
use crate::infrastructure::RateLimiter;

/// Shared services handed to every handler. Stores and the journal sit
/// behind trait objects so production backends slot in without touching
/// the API layer.
#[derive(Clone)]
pub struct AppState {
    pub auth_config: Arc<AuthConfig>,
    pub export_config: Arc<ExportConfig>,
    pub key_store: Arc<dyn ApiKeyStore>,
    pub tenant_store: Arc<dyn TenantStore>,
    pub audit_journal: Arc<dyn AuditJournal>,
    pub export_engine: ExportEngine,
    /// Per-key admission control on authenticated routes
    pub auth_limiter: Arc<RateLimiter>,
    /// Per-tenant admission control on export submission
    pub export_limiter: Arc<RateLimiter>,
}
