//! Tamper-evident audit journal domain model

pub mod entity;
pub mod journal;

pub use entity::{actions, AuditEntry};
pub use journal::{audit_hash, verify_chain, AuditJournal, ChainViolation};
