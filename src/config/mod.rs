//! Configuration: layered application settings plus env-driven component
//! configs for authentication and the export engine.

pub mod app_config;
pub mod auth;
pub mod env;
pub mod export;

pub use app_config::{AppConfig, LogFormat, LoggingConfig, ServerConfig};
pub use auth::{AuthConfig, HashAlgorithm};
pub use export::ExportConfig;
