//! Token-bucket rate limiting
//!
//! One bucket per string key (API key id or tenant id), refilled
//! continuously. Buckets are in-process; a shared backend can replace this
//! without changing the contract.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_fill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Admit or deny one request under `rate` tokens per window. The rate
    /// is per call so per-key overrides apply to the same bucket map. On
    /// denial the returned duration says how long until one token refills.
    pub async fn allow(&self, key: &str, rate: u32) -> (bool, Duration) {
        if rate == 0 {
            return (true, Duration::ZERO);
        }

        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        let bucket = buckets.entry(key.to_string()).or_insert(TokenBucket {
            tokens: rate,
            last_fill: now,
        });

        let elapsed = now.duration_since(bucket.last_fill);
        let refill = (elapsed.as_secs_f64() / self.window.as_secs_f64() * rate as f64) as u32;
        if refill > 0 {
            bucket.tokens = bucket.tokens.saturating_add(refill).min(rate);
            bucket.last_fill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            return (true, Duration::ZERO);
        }

        (false, self.window / rate)
    }

    pub async fn reset(&self, key: &str) {
        self.buckets.lock().await.remove(key);
    }
}

/// Whole seconds for a `Retry-After` header, never less than 1.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_secs().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_until_exhausted() {
        let limiter = RateLimiter::new(Duration::from_secs(60));

        for _ in 0..3 {
            let (allowed, _) = limiter.allow("key-1", 3).await;
            assert!(allowed);
        }
        let (allowed, retry_after) = limiter.allow("key-1", 3).await;
        assert!(!allowed);
        assert_eq!(retry_after, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60));

        assert!(limiter.allow("key-1", 1).await.0);
        assert!(!limiter.allow("key-1", 1).await.0);
        assert!(limiter.allow("key-2", 1).await.0);
    }

    #[tokio::test]
    async fn test_refills_over_time() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        assert!(limiter.allow("key-1", 2).await.0);
        assert!(limiter.allow("key-1", 2).await.0);
        assert!(!limiter.allow("key-1", 2).await.0);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(limiter.allow("key-1", 2).await.0);
    }

    #[tokio::test]
    async fn test_reset_refills_bucket() {
        let limiter = RateLimiter::new(Duration::from_secs(60));

        assert!(limiter.allow("key-1", 1).await.0);
        assert!(!limiter.allow("key-1", 1).await.0);

        limiter.reset("key-1").await;
        assert!(limiter.allow("key-1", 1).await.0);
    }

    #[tokio::test]
    async fn test_zero_rate_means_unlimited() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        for _ in 0..100 {
            assert!(limiter.allow("key-1", 0).await.0);
        }
    }

    #[test]
    fn test_retry_after_floor() {
        assert_eq!(retry_after_secs(Duration::from_millis(200)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
    }
}
