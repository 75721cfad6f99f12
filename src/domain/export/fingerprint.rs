//! Criteria fingerprinting

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::validation::ValidatedExport;

/// Canonical form hashed into the criteria fingerprint. Field order is
/// fixed; changing it changes every fingerprint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CriteriaPayload<'a> {
    tenant: &'a str,
    from: String,
    to: String,
    partner: Option<&'a str>,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    format: &'a str,
}

/// Deterministic SHA-256 over the semantic fields of an export request,
/// scoped by tenant. Two submissions with the same criteria collide here,
/// which is what the duplicate-job check keys on.
pub fn criteria_hash(tenant_id: &str, req: &ValidatedExport) -> String {
    let payload = CriteriaPayload {
        tenant: tenant_id,
        from: req.from.format("%Y-%m-%d").to_string(),
        to: req.to.format("%Y-%m-%d").to_string(),
        partner: req.partner.as_deref(),
        min_amount: req.min_amount,
        max_amount: req.max_amount,
        format: &req.format,
    };
    let bytes = serde_json::to_vec(&payload).expect("criteria payload serializes");
    hex::encode(Sha256::digest(&bytes))
}
