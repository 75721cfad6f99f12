//! In-memory audit journal
//!
//! Reference implementation of `AuditJournal`. A production deployment
//! swaps in a journaling store keeping a per-tenant latest-hash index so
//! `last` stays O(1).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::audit::{audit_hash, AuditEntry, AuditJournal};
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryAuditJournal {
    entries: RwLock<HashMap<String, Vec<AuditEntry>>>,
}

impl InMemoryAuditJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full chain for a tenant, oldest first. Used by verification and tests.
    pub async fn entries(&self, tenant_id: &str) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.get(tenant_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AuditJournal for InMemoryAuditJournal {
    /// Linking, hashing and the commit happen under one write hold, which
    /// is what keeps the per-tenant chain linear under concurrent appends.
    async fn append(&self, mut entry: AuditEntry) -> Result<AuditEntry, DomainError> {
        let mut entries = self.entries.write().await;
        let chain = entries.entry(entry.tenant_id.clone()).or_default();

        entry.prev_hash = chain.last().map(|e| e.hash.clone()).unwrap_or_default();
        entry.hash = audit_hash(&entry.prev_hash, &entry.payload());

        chain.push(entry.clone());
        Ok(entry)
    }

    async fn last(&self, tenant_id: &str) -> Result<Option<AuditEntry>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries.get(tenant_id).and_then(|chain| chain.last().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{actions, verify_chain, ChainViolation};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_entry_has_empty_prev() {
        let journal = InMemoryAuditJournal::new();
        let entry = journal
            .append(AuditEntry::new("acme", "corr-1", actions::AUTH_SUCCESS))
            .await
            .unwrap();

        assert!(entry.prev_hash.is_empty());
        assert_eq!(entry.hash.len(), 64);
    }

    #[tokio::test]
    async fn test_entries_link_per_tenant() {
        let journal = InMemoryAuditJournal::new();
        let first = journal
            .append(AuditEntry::new("acme", "corr-1", actions::AUTH_SUCCESS))
            .await
            .unwrap();
        let second = journal
            .append(AuditEntry::new("acme", "corr-2", actions::ZIP_CREATE))
            .await
            .unwrap();

        assert_eq!(second.prev_hash, first.hash);
        assert_eq!(journal.last("acme").await.unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_tenants_have_independent_chains() {
        let journal = InMemoryAuditJournal::new();
        journal
            .append(AuditEntry::new("acme", "corr-1", actions::AUTH_SUCCESS))
            .await
            .unwrap();
        let other = journal
            .append(AuditEntry::new("globex", "corr-2", actions::AUTH_SUCCESS))
            .await
            .unwrap();

        assert!(other.prev_hash.is_empty());
        assert!(journal.last("initech").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chain_verifies_and_detects_tampering() {
        let journal = InMemoryAuditJournal::new();
        for i in 0..3 {
            journal
                .append(AuditEntry::new("acme", format!("corr-{i}"), actions::ZIP_GET))
                .await
                .unwrap();
        }

        let mut entries = journal.entries("acme").await;
        assert_eq!(verify_chain(&entries), Ok(()));

        entries[1].action = "audit.zip.cancel".to_string();
        assert_eq!(
            verify_chain(&entries),
            Err(ChainViolation::HashMismatch { index: 1 })
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_stay_linear() {
        let journal = Arc::new(InMemoryAuditJournal::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let journal = journal.clone();
                tokio::spawn(async move {
                    journal
                        .append(AuditEntry::new("acme", format!("corr-{i}"), actions::ZIP_GET))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = journal.entries("acme").await;
        assert_eq!(entries.len(), 16);
        assert_eq!(verify_chain(&entries), Ok(()));
    }
}
