//! Infrastructure layer: concrete stores, engines and cross-cutting services

pub mod audit;
pub mod export;
pub mod keys;
pub mod logging;
pub mod rate_limit;

pub use rate_limit::RateLimiter;
