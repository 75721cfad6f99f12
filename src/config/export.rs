//! Archive export configuration

use std::time::Duration;

use super::env::{get_duration, get_env, get_parsed};

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Bucket prefix under which artifacts are stored
    pub bucket: String,
    pub sign_url_ttl: Duration,
    /// How long artifacts and terminal job records are retained
    pub retention_period: Duration,
    /// Maximum inclusive date span an export may cover
    pub max_range_days: i64,
    /// Size estimate driving the split hint on oversized ranges
    pub est_mb_per_day: f64,
    /// Maximum non-terminal jobs across all tenants
    pub max_queue_depth: usize,
    pub max_concurrent_jobs: usize,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Per-tenant submission rate per minute
    pub rate_per_min: u32,
    /// Retry-After hint returned when the queue is full
    pub queue_retry_after: Duration,
}

impl ExportConfig {
    pub fn from_env() -> Self {
        Self {
            bucket: get_env("AUDIT_S3_BUCKET", "audit-archives"),
            sign_url_ttl: get_duration("AUDIT_SIGN_URL_TTL", Duration::from_secs(600)),
            retention_period: Duration::from_secs(
                get_parsed::<u64>("AUDIT_RETENTION_DAYS", 7) * 24 * 3600,
            ),
            max_range_days: get_parsed("AUDIT_MAX_RANGE_DAYS", 92),
            est_mb_per_day: get_parsed("AUDIT_EST_MB_PER_DAY", 5.0),
            max_queue_depth: get_parsed("AUDIT_MAX_QUEUE_DEPTH", 100),
            max_concurrent_jobs: get_parsed("AUDIT_MAX_CONCURRENCY", 4usize).max(1),
            max_retries: get_parsed("AUDIT_MAX_RETRIES", 3u32).max(1),
            retry_base_delay: get_duration("AUDIT_RETRY_BASE_DELAY", Duration::from_secs(2)),
            rate_per_min: get_parsed("AUDIT_RATE_PER_MIN", 60),
            queue_retry_after: get_duration("AUDIT_RETRY_AFTER", Duration::from_secs(30)),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            bucket: "audit-archives".to_string(),
            sign_url_ttl: Duration::from_secs(600),
            retention_period: Duration::from_secs(7 * 24 * 3600),
            max_range_days: 92,
            est_mb_per_day: 5.0,
            max_queue_depth: 100,
            max_concurrent_jobs: 4,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
            rate_per_min: 60,
            queue_retry_after: Duration::from_secs(30),
        }
    }
}
