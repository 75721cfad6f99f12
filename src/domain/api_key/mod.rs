//! API key domain model

pub mod entity;
pub mod repository;

pub use entity::{scopes, ApiKey};
pub use repository::ApiKeyStore;
