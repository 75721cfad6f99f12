//! API key store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::ApiKey;
use crate::domain::tenant::Tenant;
use crate::domain::DomainError;

/// Persistence contract for API keys.
///
/// `validate_key` is the hot path: implementations may index by the public
/// prefix to narrow the candidate set, but must run a constant-time hash
/// verification on every candidate and must surface unusable keys (revoked,
/// expired beyond grace, suspended or missing tenant) uniformly as
/// `InvalidApiKey` so existence is not disclosed.
#[async_trait]
pub trait ApiKeyStore: Send + Sync + Debug {
    /// Resolve a raw key to its tenant and key metadata.
    async fn validate_key(&self, raw_key: &str) -> Result<(Tenant, ApiKey), DomainError>;

    /// Create a new key for a tenant. Returns the metadata and the raw
    /// secret; the raw secret is never obtainable again.
    async fn create_key(
        &self,
        tenant_id: &str,
        name: &str,
        scopes: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(ApiKey, String), DomainError>;

    /// Replace a key, leaving the old one valid for the rotation grace
    /// window. The new key inherits tenant, scopes and rate-limit override.
    async fn rotate_key(
        &self,
        tenant_id: &str,
        key_id: &str,
    ) -> Result<(ApiKey, String), DomainError>;

    /// Irreversibly revoke a key.
    async fn revoke_key(&self, tenant_id: &str, key_id: &str) -> Result<(), DomainError>;

    /// All keys of a tenant, hashes cleared.
    async fn list_keys(&self, tenant_id: &str) -> Result<Vec<ApiKey>, DomainError>;

    /// Best-effort last-used stamp; missing keys are ignored.
    async fn update_last_used(&self, key_id: &str) -> Result<(), DomainError>;
}
