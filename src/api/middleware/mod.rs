//! Request middleware: authentication, scope and admission control

pub mod auth;
pub mod rate_limit;
pub mod scope;

pub use auth::{auth_middleware, correlation_middleware, CorrelationId, CORRELATION_HEADER};
