//! In-memory key and tenant store
//!
//! Reference implementation of `ApiKeyStore` and `TenantStore` for tests
//! and local runs; production swaps in a relational store behind the same
//! traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::domain::api_key::{ApiKey, ApiKeyStore};
use crate::domain::tenant::{Tenant, TenantStatus, TenantStore};
use crate::domain::DomainError;

use super::hasher::{extract_key_prefix, generate_api_key, hash_key, verify_key};

#[derive(Debug, Default)]
struct StoreInner {
    tenants: HashMap<String, Tenant>,
    keys: HashMap<String, ApiKey>,
    /// public prefix -> key ids sharing it
    by_prefix: HashMap<String, Vec<String>>,
}

/// Both stores behind one lock: key writes and tenant writes are rare,
/// and key validation only ever takes the read side.
#[derive(Debug)]
pub struct InMemoryKeyStore {
    cfg: AuthConfig,
    inner: RwLock<StoreInner>,
}

impl InMemoryKeyStore {
    pub fn new(cfg: AuthConfig) -> Self {
        Self {
            cfg,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    fn build_key(
        &self,
        tenant_id: &str,
        name: &str,
        scopes: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(ApiKey, String), DomainError> {
        let generated = generate_api_key();
        let hash = hash_key(&generated.raw, &self.cfg)?;

        let mut key = ApiKey::new(
            Uuid::new_v4().to_string(),
            tenant_id,
            name,
            generated.prefix,
            hash,
            scopes,
        );
        if let Some(expires_at) = expires_at {
            key = key.with_expiration(expires_at);
        }
        Ok((key, generated.raw))
    }

    fn index(inner: &mut StoreInner, key: ApiKey) {
        inner
            .by_prefix
            .entry(key.key_prefix().to_string())
            .or_default()
            .push(key.id().to_string());
        inner.keys.insert(key.id().to_string(), key);
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryKeyStore {
    /// Resolve a raw key. The prefix index narrows the candidate set; each
    /// candidate still gets a constant-time hash verification. Revoked keys
    /// and keys expired beyond the rotation allowance surface as
    /// `InvalidApiKey` so existence is not disclosed. Tenant status is
    /// returned as-is; the auth gate turns a suspended tenant into 403.
    async fn validate_key(&self, raw_key: &str) -> Result<(Tenant, ApiKey), DomainError> {
        if !raw_key.starts_with(super::hasher::KEY_TAG) {
            return Err(DomainError::InvalidKeyFormat);
        }
        let prefix = extract_key_prefix(raw_key).ok_or(DomainError::InvalidApiKey)?;

        let now = Utc::now();
        let inner = self.inner.read().await;

        let candidates = inner.by_prefix.get(prefix).map(Vec::as_slice).unwrap_or(&[]);
        for key_id in candidates {
            let Some(key) = inner.keys.get(key_id) else {
                continue;
            };
            if !verify_key(raw_key, key.key_hash()) {
                continue;
            }
            if !key.usable_at(now, self.cfg.key_rotation_window) {
                return Err(DomainError::InvalidApiKey);
            }
            let tenant = inner
                .tenants
                .get(key.tenant_id())
                .ok_or(DomainError::InvalidApiKey)?;
            return Ok((tenant.clone(), key.clone()));
        }

        Err(DomainError::InvalidApiKey)
    }

    async fn create_key(
        &self,
        tenant_id: &str,
        name: &str,
        scopes: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(ApiKey, String), DomainError> {
        if scopes.is_empty() {
            return Err(DomainError::validation("at least one scope is required"));
        }

        let mut inner = self.inner.write().await;
        if !inner.tenants.contains_key(tenant_id) {
            return Err(DomainError::not_found(format!(
                "tenant '{tenant_id}' not found"
            )));
        }

        let (key, raw) = self.build_key(tenant_id, name, scopes, expires_at)?;
        let created = key.clone();
        Self::index(&mut inner, key);

        Ok((created, raw))
    }

    async fn rotate_key(
        &self,
        tenant_id: &str,
        key_id: &str,
    ) -> Result<(ApiKey, String), DomainError> {
        let mut inner = self.inner.write().await;

        let old = inner
            .keys
            .get(key_id)
            .filter(|k| k.tenant_id() == tenant_id)
            .ok_or_else(|| DomainError::not_found(format!("API key '{key_id}' not found")))?
            .clone();
        if old.is_revoked() {
            return Err(DomainError::conflict("cannot rotate a revoked key"));
        }

        let (mut key, raw) = self.build_key(
            tenant_id,
            &format!("{} (rotated)", old.name()),
            old.scopes().to_vec(),
            None,
        )?;
        if let Some(per_minute) = old.rate_limit() {
            key = key.with_rate_limit(per_minute);
        }
        let key = key.with_rotated_from(old.id());
        let created = key.clone();

        let grace_ends = Utc::now() + self.cfg.key_rotation_window;
        if let Some(old) = inner.keys.get_mut(key_id) {
            old.mark_rotated(grace_ends);
        }
        Self::index(&mut inner, key);

        Ok((created, raw))
    }

    async fn revoke_key(&self, tenant_id: &str, key_id: &str) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;

        let key = inner
            .keys
            .get_mut(key_id)
            .filter(|k| k.tenant_id() == tenant_id)
            .ok_or_else(|| DomainError::not_found(format!("API key '{key_id}' not found")))?;
        key.revoke(Utc::now());
        Ok(())
    }

    async fn list_keys(&self, tenant_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        let inner = self.inner.read().await;
        let mut keys: Vec<ApiKey> = inner
            .keys
            .values()
            .filter(|k| k.tenant_id() == tenant_id)
            .map(ApiKey::scrubbed)
            .collect();
        keys.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        Ok(keys)
    }

    async fn update_last_used(&self, key_id: &str) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        if let Some(key) = inner.keys.get_mut(key_id) {
            key.record_usage(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl TenantStore for InMemoryKeyStore {
    async fn create_tenant(&self, tenant: Tenant) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        if inner.tenants.contains_key(tenant.id()) {
            return Err(DomainError::conflict(format!(
                "tenant '{}' already exists",
                tenant.id()
            )));
        }
        inner.tenants.insert(tenant.id().to_string(), tenant);
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Tenant, DomainError> {
        let inner = self.inner.read().await;
        inner
            .tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("tenant '{tenant_id}' not found")))
    }

    async fn update_tenant_status(
        &self,
        tenant_id: &str,
        status: TenantStatus,
    ) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        let tenant = inner
            .tenants
            .get_mut(tenant_id)
            .ok_or_else(|| DomainError::not_found(format!("tenant '{tenant_id}' not found")))?;
        tenant.set_status(status);
        Ok(())
    }
}
