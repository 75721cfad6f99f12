//! Audit journal entries

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action tags recorded in the journal, dotted by namespace.
pub mod actions {
    pub const AUTH_SUCCESS: &str = "auth.success";
    pub const AUTH_MISSING_KEY: &str = "auth.missing_key";
    pub const AUTH_INVALID_FORMAT: &str = "auth.invalid_format";
    pub const AUTH_INVALID_KEY: &str = "auth.invalid_key";
    pub const AUTH_TENANT_SUSPENDED: &str = "auth.tenant_suspended";
    pub const AUTH_KEY_EXPIRED: &str = "auth.key_expired";
    pub const AUTH_KEY_REVOKED: &str = "auth.key_revoked";
    pub const AUTH_FAILED: &str = "auth.failed";
    pub const ZIP_CREATE: &str = "audit.zip.create";
    pub const ZIP_GET: &str = "audit.zip.get";
    pub const ZIP_CANCEL: &str = "audit.zip.cancel";
}

/// One immutable journal record. Entries for a tenant form a hash chain:
/// `hash = SHA-256(prev_hash ∥ payload)`, with `prev_hash` empty on the
/// first entry. Nothing ever mutates or deletes a committed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    /// Chain scope; empty when the caller could not be attributed
    pub tenant_id: String,
    pub corr_id: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria_hash: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ip_address: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditEntry {
    /// A new unlinked entry; the journal fills `prev_hash` and `hash` at
    /// append time.
    pub fn new(
        tenant_id: impl Into<String>,
        corr_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            corr_id: corr_id.into(),
            action: action.into(),
            key_id: None,
            criteria_hash: None,
            ip_address: String::new(),
            user_agent: String::new(),
            timestamp: Utc::now(),
            prev_hash: String::new(),
            hash: String::new(),
        }
    }

    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn with_criteria_hash(mut self, criteria_hash: impl Into<String>) -> Self {
        self.criteria_hash = Some(criteria_hash.into());
        self
    }

    pub fn with_client(mut self, ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self.user_agent = user_agent.into();
        self
    }

    /// The hashed representation: `id|tenant|action|timestamp|prev_hash`,
    /// order-sensitive, with an RFC3339 nanosecond timestamp.
    pub fn payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.id,
            self.tenant_id,
            self.action,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.prev_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_order_sensitive() {
        let mut entry = AuditEntry::new("acme", "corr-1", actions::AUTH_SUCCESS);
        entry.prev_hash = "deadbeef".to_string();

        let payload = entry.payload();
        assert!(payload.starts_with(&format!("{}|acme|auth.success|", entry.id)));
        assert!(payload.ends_with("|deadbeef"));
    }

    #[test]
    fn test_new_entry_unlinked() {
        let entry = AuditEntry::new("acme", "corr-1", actions::ZIP_CREATE);
        assert!(entry.prev_hash.is_empty());
        assert!(entry.hash.is_empty());
        assert_eq!(entry.action, "audit.zip.create");
    }
}
