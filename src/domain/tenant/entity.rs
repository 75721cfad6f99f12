//! Tenant entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a tenant account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Tenant is active and its keys may authenticate
    #[default]
    Active,
    /// Tenant is suspended; all of its keys are rejected
    Suspended,
}

impl TenantStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// A tenant is the unit of isolation: every key, audit entry, job and
/// artifact belongs to exactly one tenant. Tenants are suspended rather
/// than deleted so their audit chain stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    id: String,
    name: String,
    plan: String,
    status: TenantStatus,
    created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plan: plan.into(),
            status: TenantStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    pub fn status(&self) -> TenantStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn set_status(&mut self, status: TenantStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tenant_is_active() {
        let tenant = Tenant::new("acme", "Acme GmbH", "pro");
        assert_eq!(tenant.id(), "acme");
        assert_eq!(tenant.plan(), "pro");
        assert!(tenant.is_active());
    }

    #[test]
    fn test_suspend() {
        let mut tenant = Tenant::new("acme", "Acme GmbH", "free");
        tenant.set_status(TenantStatus::Suspended);
        assert!(!tenant.is_active());
        assert_eq!(tenant.status().to_string(), "suspended");
    }
}
