//! Export request validation

use chrono::NaiveDate;

use super::entity::{ExportRequest, FieldError, SplitHint};
use crate::config::ExportConfig;

const MAX_PARTNER_LEN: usize = 140;

/// A request that passed validation, with dates in parsed form. This is the
/// canonical shape used for fingerprinting and by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedExport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub partner: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub format: String,
}

/// Why a request was refused.
#[derive(Debug, Clone)]
pub enum ValidationFailure {
    /// 400 with the offending fields
    Invalid(Vec<FieldError>),
    /// 413 with split guidance
    RangeTooLarge(SplitHint),
}

/// Validate an export request against the configured limits.
pub fn validate_request(
    req: &ExportRequest,
    cfg: &ExportConfig,
) -> Result<ValidatedExport, ValidationFailure> {
    let mut errs = Vec::new();

    if req.from.is_empty() || req.to.is_empty() {
        errs.push(FieldError::new(
            "AUDIT-REQ-001",
            "from/to",
            "from and to dates are required",
        ));
        return Err(ValidationFailure::Invalid(errs));
    }

    let from = parse_date(&req.from)
        .map_err(|msg| errs.push(FieldError::new("AUDIT-REQ-002", "from", msg)))
        .ok();
    let to = parse_date(&req.to)
        .map_err(|msg| errs.push(FieldError::new("AUDIT-REQ-003", "to", msg)))
        .ok();

    if let (Some(from), Some(to)) = (from, to) {
        if to < from {
            errs.push(FieldError::new(
                "AUDIT-REQ-004",
                "to",
                "to must be on or after from",
            ));
        }
    }

    if req.format != "zip" {
        errs.push(FieldError::new(
            "AUDIT-REQ-005",
            "format",
            "format must be zip",
        ));
    }

    if let Some(partner) = &req.partner {
        if partner.len() > MAX_PARTNER_LEN {
            errs.push(FieldError::new(
                "AUDIT-REQ-006",
                "partner",
                "partner too long",
            ));
        }
    }

    for (path, amount) in [("minAmount", req.min_amount), ("maxAmount", req.max_amount)] {
        if let Some(value) = amount {
            if value < 0.0 {
                errs.push(FieldError::new(
                    "AUDIT-REQ-007",
                    path,
                    "amount must not be negative",
                ));
            }
        }
    }
    if let (Some(min), Some(max)) = (req.min_amount, req.max_amount) {
        if min > max {
            errs.push(FieldError::new(
                "AUDIT-REQ-008",
                "minAmount",
                "minAmount must not exceed maxAmount",
            ));
        }
    }

    let (Some(from), Some(to)) = (from, to) else {
        return Err(ValidationFailure::Invalid(errs));
    };
    if !errs.is_empty() {
        return Err(ValidationFailure::Invalid(errs));
    }
    let range_days = (to - from).num_days();
    if range_days > cfg.max_range_days {
        return Err(ValidationFailure::RangeTooLarge(split_hint(
            range_days,
            cfg.max_range_days,
            cfg.est_mb_per_day,
        )));
    }

    Ok(ValidatedExport {
        from,
        to,
        partner: req.partner.clone(),
        min_amount: req.min_amount,
        max_amount: req.max_amount,
        format: req.format.clone(),
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date: {s}"))
}

fn split_hint(range_days: i64, max_range_days: i64, est_mb_per_day: f64) -> SplitHint {
    let chunks = (range_days as u64).div_ceil(max_range_days.max(1) as u64);
    let approx_size_mb = (est_mb_per_day * range_days as f64 / chunks as f64).ceil() as u64;
    SplitHint {
        chunks,
        approx_size_mb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ExportConfig {
        ExportConfig::default()
    }

    fn request(from: &str, to: &str) -> ExportRequest {
        ExportRequest {
            from: from.to_string(),
            to: to.to_string(),
            partner: None,
            min_amount: None,
            max_amount: None,
            format: "zip".to_string(),
        }
    }

    #[test]
    fn test_valid_request() {
        let validated = validate_request(&request("2025-01-01", "2025-01-31"), &cfg()).unwrap();
        assert_eq!(validated.from.to_string(), "2025-01-01");
        assert_eq!((validated.to - validated.from).num_days(), 30);
    }

    #[test]
    fn test_missing_dates() {
        let err = validate_request(&request("", ""), &cfg()).unwrap_err();
        match err {
            ValidationFailure::Invalid(errs) => {
                assert_eq!(errs.len(), 1);
                assert_eq!(errs[0].code, "AUDIT-REQ-001");
            }
            _ => panic!("expected field errors"),
        }
    }

    #[test]
    fn test_unparseable_date() {
        let err = validate_request(&request("01.01.2025", "2025-01-31"), &cfg()).unwrap_err();
        match err {
            ValidationFailure::Invalid(errs) => assert_eq!(errs[0].path, "from"),
            _ => panic!("expected field errors"),
        }
    }

    #[test]
    fn test_reversed_range() {
        let err = validate_request(&request("2025-02-01", "2025-01-01"), &cfg()).unwrap_err();
        match err {
            ValidationFailure::Invalid(errs) => assert_eq!(errs[0].code, "AUDIT-REQ-004"),
            _ => panic!("expected field errors"),
        }
    }

    #[test]
    fn test_bad_format() {
        let mut req = request("2025-01-01", "2025-01-31");
        req.format = "tar".to_string();
        let err = validate_request(&req, &cfg()).unwrap_err();
        match err {
            ValidationFailure::Invalid(errs) => assert_eq!(errs[0].path, "format"),
            _ => panic!("expected field errors"),
        }
    }

    #[test]
    fn test_partner_too_long() {
        let mut req = request("2025-01-01", "2025-01-31");
        req.partner = Some("x".repeat(141));
        let err = validate_request(&req, &cfg()).unwrap_err();
        match err {
            ValidationFailure::Invalid(errs) => assert_eq!(errs[0].code, "AUDIT-REQ-006"),
            _ => panic!("expected field errors"),
        }
    }

    #[test]
    fn test_negative_and_inverted_amounts() {
        let mut req = request("2025-01-01", "2025-01-31");
        req.min_amount = Some(-1.0);
        match validate_request(&req, &cfg()).unwrap_err() {
            ValidationFailure::Invalid(errs) => assert_eq!(errs[0].code, "AUDIT-REQ-007"),
            _ => panic!("expected field errors"),
        }

        req.min_amount = Some(100.0);
        req.max_amount = Some(50.0);
        match validate_request(&req, &cfg()).unwrap_err() {
            ValidationFailure::Invalid(errs) => assert_eq!(errs[0].code, "AUDIT-REQ-008"),
            _ => panic!("expected field errors"),
        }
    }

    #[test]
    fn test_range_too_large_yields_split_hint() {
        // 730 days over a 92-day cap: ceil(730/92) = 8 chunks,
        // ceil(5.0 * 730 / 8) = 457 MB each
        let err = validate_request(&request("2024-01-01", "2025-12-31"), &cfg()).unwrap_err();
        match err {
            ValidationFailure::RangeTooLarge(hint) => {
                assert_eq!(hint.chunks, 8);
                assert_eq!(hint.approx_size_mb, 457);
            }
            _ => panic!("expected split hint"),
        }
    }

    #[test]
    fn test_range_at_limit_passes() {
        let err = validate_request(&request("2025-01-01", "2025-04-03"), &cfg());
        assert!(err.is_ok(), "92-day span must be accepted");
    }
}
