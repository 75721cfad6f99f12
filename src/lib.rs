//! paperpack
//!
//! Security and integrity core of a multi-tenant e-bookkeeping archive
//! backend:
//! - API-key authentication with scoped authorization and key lifecycle
//!   (issue, rotate with grace, revoke)
//! - a per-tenant, hash-chained, append-only audit journal
//! - an asynchronous archive-export engine with idempotency,
//!   criteria-level de-duplication, bounded concurrency, cancellation,
//!   retries and signed-URL delivery with retention

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use config::{AuthConfig, ExportConfig};
use infrastructure::audit::InMemoryAuditJournal;
use infrastructure::export::{ExportEngine, InMemoryArtifactStore};
use infrastructure::keys::InMemoryKeyStore;
use infrastructure::RateLimiter;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Application state with configuration drawn from the environment.
pub fn create_app_state() -> AppState {
    create_app_state_with_config(AuthConfig::from_env(), ExportConfig::from_env())
}

/// Application state over the in-memory reference backends.
pub fn create_app_state_with_config(auth: AuthConfig, export: ExportConfig) -> AppState {
    let store = Arc::new(InMemoryKeyStore::new(auth.clone()));
    let journal = Arc::new(InMemoryAuditJournal::new());
    let storage = Arc::new(InMemoryArtifactStore::new());
    let engine = ExportEngine::new(export.clone(), storage);

    AppState {
        auth_config: Arc::new(auth),
        export_config: Arc::new(export),
        key_store: store.clone(),
        tenant_store: store,
        audit_journal: journal,
        export_engine: engine,
        auth_limiter: Arc::new(RateLimiter::new(RATE_WINDOW)),
        export_limiter: Arc::new(RateLimiter::new(RATE_WINDOW)),
    }
}
