//! Authentication configuration

use std::time::Duration;

use super::env::{get_bool, get_duration, get_env, get_parsed};

/// Supported key-hashing algorithms. The algorithm is per-hash (detected
/// from the stored format on verify), so changing this is a rolling change
/// that never requires rehashing existing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Bcrypt,
    Argon2,
}

impl HashAlgorithm {
    fn from_name(name: &str) -> Self {
        match name {
            "argon2" => Self::Argon2,
            _ => Self::Bcrypt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub hash_algorithm: HashAlgorithm,
    pub bcrypt_cost: u32,
    pub argon2_time: u32,
    /// Argon2 memory parameter in KiB
    pub argon2_memory_kib: u32,
    pub argon2_threads: u32,
    /// Grace period during which a rotated-out key still verifies
    pub key_rotation_window: chrono::Duration,
    /// Default per-key request rate per minute
    pub rate_per_min: u32,
    /// How long a caching store may reuse a validated key
    pub key_cache_ttl: Duration,
    pub enable_audit: bool,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let rotation = get_duration("AUTH_KEY_ROTATION_WINDOW", Duration::from_secs(24 * 3600));
        Self {
            hash_algorithm: HashAlgorithm::from_name(&get_env("AUTH_HASH_ALGORITHM", "bcrypt")),
            bcrypt_cost: get_parsed("AUTH_BCRYPT_COST", 12),
            argon2_time: get_parsed("AUTH_ARGON2_TIME", 1),
            argon2_memory_kib: get_parsed("AUTH_ARGON2_MEMORY", 64 * 1024),
            argon2_threads: get_parsed("AUTH_ARGON2_THREADS", 4),
            key_rotation_window: chrono::Duration::milliseconds(rotation.as_millis() as i64),
            rate_per_min: get_parsed("AUTH_RATE_PER_MIN", 100),
            key_cache_ttl: get_duration("AUTH_KEY_CACHE_TTL", Duration::from_secs(300)),
            enable_audit: get_bool("AUTH_ENABLE_AUDIT", true),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Bcrypt,
            bcrypt_cost: 12,
            argon2_time: 1,
            argon2_memory_kib: 64 * 1024,
            argon2_threads: 4,
            key_rotation_window: chrono::Duration::hours(24),
            rate_per_min: 100,
            key_cache_ttl: Duration::from_secs(300),
            enable_audit: true,
        }
    }
}
