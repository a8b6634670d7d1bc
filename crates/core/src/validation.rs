use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::analysis::SpendingAnalysis;

/// Accepted relative deviation between the requested and calculated totals.
pub const COST_TOLERANCE: f64 = 0.10;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error(
        "cost mismatch: requested {requested} ({requested_value}), but calculated \
         {calculated:.2} (outside 10% tolerance)"
    )]
    CostMismatch { requested: String, requested_value: f64, calculated: f64 },
    #[error(
        "cost mismatch: line items sum to {line_items:.2}, but total_calculated_cost is \
         {total:.2} (outside 10% tolerance)"
    )]
    LineItemMismatch { line_items: f64, total: f64 },
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d*)?").expect("amount pattern is valid"))
}

/// Extracts the first number in a free-form amount such as `"$1,500.75"` or
/// `"₹50000"`. Thousands separators are dropped.
pub fn parse_requested_amount(text: &str) -> Option<f64> {
    let found = amount_pattern().find(text)?;
    let digits: String = found.as_str().chars().filter(|ch| *ch != ',').collect();
    digits.trim_end_matches('.').parse::<f64>().ok()
}

pub fn tolerance_bounds(requested_value: f64) -> (f64, f64) {
    (requested_value * (1.0 - COST_TOLERANCE), requested_value * (1.0 + COST_TOLERANCE))
}

/// Checks that `calculated` lies within the tolerance band around the amount
/// in `requested`. Amounts without any number are accepted unchecked.
pub fn validate_cost_match(requested: &str, calculated: f64) -> Result<(), ValidationError> {
    let Some(requested_value) = parse_requested_amount(requested) else {
        tracing::debug!(
            event_name = "validation.cost.skipped",
            requested,
            "requested amount carries no number; skipping cost validation"
        );
        return Ok(());
    };

    let (lower, upper) = tolerance_bounds(requested_value);
    if (lower..=upper).contains(&calculated) {
        return Ok(());
    }

    Err(ValidationError::CostMismatch {
        requested: requested.to_string(),
        requested_value,
        calculated,
    })
}

/// Checks that the line items add up to `total_calculated_cost` within the
/// same tolerance band. Plans without line items are left to the warnings.
pub fn validate_line_items(analysis: &SpendingAnalysis) -> Result<(), ValidationError> {
    if analysis.services_deployed.is_empty() {
        return Ok(());
    }

    let line_items = analysis.line_item_total();
    let total = analysis.total_calculated_cost;
    let (lower, upper) = tolerance_bounds(total);
    if (lower..=upper).contains(&line_items) {
        return Ok(());
    }

    Err(ValidationError::LineItemMismatch { line_items, total })
}
