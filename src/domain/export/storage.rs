//! Artifact store trait

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::domain::DomainError;

/// Object storage for export artifacts, keyed
/// `<bucket>/<tenant>/<jobId>/<name>`. The in-memory implementation in
/// `infrastructure::export` backs tests and local runs; production swaps in
/// an S3-compatible store.
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DomainError>;

    /// A short-lived opaque URL granting read access to one object. Carries
    /// an `exp` query parameter with the RFC3339 expiry.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, DomainError>;

    async fn delete_object(&self, key: &str) -> Result<(), DomainError>;
}
