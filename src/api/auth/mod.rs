//! Tenant onboarding and key lifecycle endpoints

pub mod keys;
pub mod tenants;
