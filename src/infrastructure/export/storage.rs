//! In-memory artifact store
//!
//! Reference implementation of `ArtifactStore`; production swaps in an
//! S3-compatible object store behind the same trait.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::export::ArtifactStore;
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    #[allow(dead_code)]
    content_type: String,
}

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_size(&self, key: &str) -> Option<usize> {
        let objects = self.objects.read().await;
        objects.get(key).map(|o| o.body.len())
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DomainError> {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, DomainError> {
        let objects = self.objects.read().await;
        if !objects.contains_key(key) {
            return Err(DomainError::not_found(format!("object '{key}' not found")));
        }

        let expires = Utc::now() + chrono::Duration::milliseconds(ttl.as_millis() as i64);
        Ok(format!(
            "https://storage.local/{key}?exp={}",
            expires.to_rfc3339_opts(SecondsFormat::Secs, true)
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), DomainError> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }
}
