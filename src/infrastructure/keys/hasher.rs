//! API key generation, hashing and verification
//!
//! Keys are 32 random bytes, base64url-encoded behind the `ppk_` tag. At
//! rest only the 8-character public prefix and a bcrypt or Argon2id hash
//! remain; the algorithm is detected from the stored format on verify.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

use crate::config::{AuthConfig, HashAlgorithm};
use crate::domain::DomainError;

pub use crate::domain::audit::audit_hash;

/// Tag prepended to every raw key for easy identification in configs and
/// support tickets.
pub const KEY_TAG: &str = "ppk_";

const KEY_BYTES: usize = 32;
const PREFIX_LEN: usize = 8;

/// A freshly generated key. `raw` is shown to the caller exactly once.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub raw: String,
    pub prefix: String,
}

/// Generate a new raw API key and its public prefix.
pub fn generate_api_key() -> GeneratedKey {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let encoded = URL_SAFE_NO_PAD.encode(bytes);
    let prefix = encoded[..PREFIX_LEN.min(encoded.len())].to_string();

    GeneratedKey {
        raw: format!("{KEY_TAG}{encoded}"),
        prefix,
    }
}

/// Hash a raw key with the configured algorithm. Fails when the `ppk_` tag
/// is missing.
pub fn hash_key(raw_key: &str, cfg: &AuthConfig) -> Result<String, DomainError> {
    let key_data = raw_key
        .strip_prefix(KEY_TAG)
        .ok_or(DomainError::InvalidKeyFormat)?;

    match cfg.hash_algorithm {
        HashAlgorithm::Bcrypt => hash_bcrypt(key_data, cfg.bcrypt_cost),
        HashAlgorithm::Argon2 => hash_argon2(key_data, cfg),
    }
}

/// Verify a raw key against a stored hash. The algorithm comes from the
/// hash prefix; any parse failure verifies false without detail.
pub fn verify_key(raw_key: &str, stored_hash: &str) -> bool {
    let Some(key_data) = raw_key.strip_prefix(KEY_TAG) else {
        return false;
    };

    if stored_hash.starts_with("$2") {
        return bcrypt::verify(key_data, stored_hash).unwrap_or(false);
    }
    if stored_hash.starts_with("$argon2") {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        return Argon2::default()
            .verify_password(key_data.as_bytes(), &parsed)
            .is_ok();
    }

    false
}

fn hash_bcrypt(data: &str, cost: u32) -> Result<String, DomainError> {
    bcrypt::hash(data, cost).map_err(|e| DomainError::internal(format!("bcrypt hash failed: {e}")))
}

fn hash_argon2(data: &str, cfg: &AuthConfig) -> Result<String, DomainError> {
    let params = Params::new(
        cfg.argon2_memory_kib,
        cfg.argon2_time,
        cfg.argon2_threads,
        Some(32),
    )
    .map_err(|e| DomainError::internal(format!("argon2 params invalid: {e}")))?;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(data.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::internal(format!("argon2 hash failed: {e}")))
}

/// The 8-character public prefix of a raw key, for non-secret log
/// correlation when lookup fails. `None` when the tag is missing or the
/// body is too short.
pub fn extract_key_prefix(raw_key: &str) -> Option<&str> {
    let key_data = raw_key.strip_prefix(KEY_TAG)?;
    if key_data.len() < PREFIX_LEN {
        return None;
    }
    Some(&key_data[..PREFIX_LEN])
}
