//! API key entity and scope vocabulary

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Dotted permission tokens. A key holding `*` passes every scope check.
pub mod scopes {
    pub const AUDIT_READ: &str = "audit:read";
    pub const AUDIT_WRITE: &str = "audit:write";
    pub const INVOICE_READ: &str = "invoice:read";
    pub const INVOICE_WRITE: &str = "invoice:write";
    pub const ADMIN_READ: &str = "admin:read";
    pub const ADMIN_WRITE: &str = "admin:write";

    /// The full scope set granted to a tenant's initial key.
    pub fn all() -> Vec<String> {
        vec![
            AUDIT_READ.to_string(),
            AUDIT_WRITE.to_string(),
            INVOICE_READ.to_string(),
            INVOICE_WRITE.to_string(),
            ADMIN_READ.to_string(),
            ADMIN_WRITE.to_string(),
        ]
    }
}

/// A stored API key. The raw secret is returned exactly once at creation
/// or rotation; only the 8-character public prefix and the hash persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    id: String,
    tenant_id: String,
    /// Human-readable label
    name: String,
    /// First 8 characters of the encoded secret, for display and log correlation
    key_prefix: String,
    /// Hashed secret; never serialized into API responses
    #[serde(skip_serializing, default)]
    key_hash: String,
    scopes: Vec<String>,
    /// Per-key rate-limit override in requests per minute
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
    /// True once this key has been rotated out (grace period running)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    rotated: bool,
    /// Id of the predecessor key when this key was created by rotation
    #[serde(skip_serializing_if = "Option::is_none")]
    rotated_from: Option<String>,
}

impl ApiKey {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        key_prefix: impl Into<String>,
        key_hash: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            key_prefix: key_prefix.into(),
            key_hash: key_hash.into(),
            scopes,
            rate_limit: None,
            expires_at: None,
            last_used_at: None,
            created_at: Utc::now(),
            revoked_at: None,
            rotated: false,
            rotated_from: None,
        }
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit = Some(per_minute);
        self
    }

    pub fn with_rotated_from(mut self, predecessor: impl Into<String>) -> Self {
        self.rotated_from = Some(predecessor.into());
        self
    }

    // Getters

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn rate_limit(&self) -> Option<u32> {
        self.rate_limit
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn rotated(&self) -> bool {
        self.rotated
    }

    pub fn rotated_from(&self) -> Option<&str> {
        self.rotated_from.as_deref()
    }

    // Lifecycle

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Strict expiration check. Rotation already folds the grace window
    /// into `expires_at`, so no extra allowance applies here.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Whether the store should still resolve this key. A rotated key is
    /// resolvable for one grace window past its expiration so the auth
    /// gate can answer `KEY_EXPIRED` instead of `INVALID_KEY`.
    pub fn usable_at(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        if self.is_revoked() {
            return false;
        }
        match self.expires_at {
            None => true,
            Some(exp) => now < exp || (self.rotated && now < exp + grace),
        }
    }

    pub fn revoke(&mut self, now: DateTime<Utc>) {
        self.revoked_at = Some(now);
    }

    /// Flag this key as rotated out, expiring at the end of the grace window.
    pub fn mark_rotated(&mut self, expires_at: DateTime<Utc>) {
        self.rotated = true;
        self.expires_at = Some(expires_at);
    }

    pub fn record_usage(&mut self, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
    }

    /// Copy for listing responses with the hash cleared.
    pub fn scrubbed(&self) -> Self {
        let mut copy = self.clone();
        copy.key_hash = String::new();
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> ApiKey {
        ApiKey::new(
            "key-1",
            "acme",
            "CI key",
            "abcd1234",
            "$2b$04$hash",
            vec![scopes::AUDIT_WRITE.to_string()],
        )
    }

    #[test]
    fn test_fresh_key_usable() {
        let key = test_key();
        assert!(key.usable_at(Utc::now(), Duration::hours(24)));
        assert!(!key.is_expired(Utc::now()));
        assert!(!key.is_revoked());
    }

    #[test]
    fn test_revoked_key_unusable() {
        let mut key = test_key();
        key.revoke(Utc::now());
        assert!(key.is_revoked());
        assert!(!key.usable_at(Utc::now(), Duration::hours(24)));
    }

    #[test]
    fn test_expired_key_unusable_without_rotation() {
        let now = Utc::now();
        let key = test_key().with_expiration(now - Duration::seconds(1));
        assert!(key.is_expired(now));
        assert!(!key.usable_at(now, Duration::hours(24)));
    }

    #[test]
    fn test_rotated_key_resolvable_through_grace() {
        let now = Utc::now();
        let grace = Duration::hours(24);
        let mut key = test_key();
        key.mark_rotated(now + grace);

        // inside the grace window: not expired, usable
        assert!(!key.is_expired(now + Duration::hours(1)));
        assert!(key.usable_at(now + Duration::hours(1), grace));

        // past expiry but still resolvable so the gate can say KEY_EXPIRED
        let later = now + grace + Duration::hours(1);
        assert!(key.is_expired(later));
        assert!(key.usable_at(later, grace));

        // past expiry + grace: gone entirely
        let gone = now + grace + grace + Duration::seconds(1);
        assert!(!key.usable_at(gone, grace));
    }

    #[test]
    fn test_scrubbed_clears_hash() {
        let key = test_key();
        assert!(!key.key_hash().is_empty());
        assert!(key.scrubbed().key_hash().is_empty());
        assert_eq!(key.scrubbed().key_prefix(), key.key_prefix());
    }

    #[test]
    fn test_serialization_omits_hash() {
        let json = serde_json::to_string(&test_key()).unwrap();
        assert!(!json.contains("hash"));
        assert!(json.contains("keyPrefix"));
    }
}
