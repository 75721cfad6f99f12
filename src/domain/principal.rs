//! The authenticated caller attached to a request

use serde::{Deserialize, Serialize};

use crate::domain::api_key::ApiKey;

/// Kind of credential behind a principal. Only API keys today; the
/// discriminator exists so user sessions can be added without reshaping
/// request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    ApiKey,
}

/// Request-scoped identity produced by the auth gate. Lives in the request
/// extensions and dies with the request; downstream handlers read, never
/// write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub tenant_id: String,
    pub key_id: String,
    pub key_name: String,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    pub actor_type: ActorType,
}

impl Principal {
    pub fn from_key(key: &ApiKey) -> Self {
        Self {
            tenant_id: key.tenant_id().to_string(),
            key_id: key.id().to_string(),
            key_name: key.name().to_string(),
            scopes: key.scopes().to_vec(),
            rate_limit: key.rate_limit(),
            actor_type: ActorType::ApiKey,
        }
    }

    /// A scope matches literally, or via the `*` catch-all.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(scopes: &[&str]) -> Principal {
        Principal {
            tenant_id: "acme".to_string(),
            key_id: "key-1".to_string(),
            key_name: "CI key".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            rate_limit: None,
            actor_type: ActorType::ApiKey,
        }
    }

    #[test]
    fn test_literal_scope() {
        let p = principal(&["audit:read", "audit:write"]);
        assert!(p.has_scope("audit:write"));
        assert!(!p.has_scope("admin:write"));
    }

    #[test]
    fn test_wildcard_scope() {
        let p = principal(&["*"]);
        assert!(p.has_scope("audit:write"));
        assert!(p.has_scope("admin:read"));
    }

    #[test]
    fn test_empty_scopes() {
        let p = principal(&[]);
        assert!(!p.has_scope("audit:read"));
    }
}
