//! Tenant store trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{Tenant, TenantStatus};
use crate::domain::DomainError;

/// Persistence contract for tenants. The in-memory implementation in
/// `infrastructure::keys` is the reference; production swaps in a
/// relational store.
#[async_trait]
pub trait TenantStore: Send + Sync + Debug {
    /// Create a new tenant; fails with a conflict if the id exists.
    async fn create_tenant(&self, tenant: Tenant) -> Result<(), DomainError>;

    /// Retrieve a tenant by id.
    async fn get_tenant(&self, tenant_id: &str) -> Result<Tenant, DomainError>;

    /// Update a tenant's status (e.g. suspend).
    async fn update_tenant_status(
        &self,
        tenant_id: &str,
        status: TenantStatus,
    ) -> Result<(), DomainError>;
}
