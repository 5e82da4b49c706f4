//! Stateless command validation.
//!
//! Validators are plain functions that collect every violated rule before
//! failing, so a caller sees the full list of problems in one round trip.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// A single violated input rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub field: &'static str,
    pub message: String,
}

impl RuleViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Rejection carrying every violated rule, not just the first.
#[derive(Debug, thiserror::Error)]
#[error("validation failed: {}", .violations.iter().map(|v| v.message.as_str()).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    pub violations: Vec<RuleViolation>,
}

impl ValidationError {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            violations: vec![RuleViolation::new(field, message)],
        }
    }
}

/// Empty list means the command passed.
pub fn finish(violations: Vec<RuleViolation>) -> Result<(), ValidationError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

pub const MAX_COST: u32 = 100_000;
const MAX_NAME_LENGTH: usize = 100;

/// ULNs are ten digits and never start with a zero.
pub fn check_uln(violations: &mut Vec<RuleViolation>, uln: &str) {
    let ten_digits = uln.len() == 10 && uln.chars().all(|c| c.is_ascii_digit());
    if !ten_digits || uln.starts_with('0') {
        violations.push(RuleViolation::new(
            "uln",
            format!("'{uln}' is not a valid unique learner number"),
        ));
    }
}

pub fn check_cost(violations: &mut Vec<RuleViolation>, cost: Decimal) {
    if cost <= Decimal::ZERO {
        violations.push(RuleViolation::new("cost", "cost must be greater than zero"));
    } else if cost > Decimal::from(MAX_COST) {
        violations.push(RuleViolation::new(
            "cost",
            format!("cost must not exceed {MAX_COST}"),
        ));
    }
}

pub fn check_name(violations: &mut Vec<RuleViolation>, field: &'static str, name: &str) {
    if name.trim().is_empty() {
        violations.push(RuleViolation::new(field, format!("{field} must not be blank")));
    } else if name.len() > MAX_NAME_LENGTH {
        violations.push(RuleViolation::new(
            field,
            format!("{field} must not exceed {MAX_NAME_LENGTH} characters"),
        ));
    }
}

pub fn check_date_order(
    violations: &mut Vec<RuleViolation>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end <= start {
            violations.push(RuleViolation::new(
                "end_date",
                "end date must fall after the start date",
            ));
        }
    }
}
