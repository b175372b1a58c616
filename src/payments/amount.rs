//! Monetary amount canonicalization.
//!
//! Outbound request amounts and inbound fee/net figures all pass through
//! `normalize` so rounding can never cause a reconciliation mismatch between
//! what was requested and what the gateway reports back.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::payments::error::PaymentError;

/// Round to exactly 2 decimal places, half away from zero.
///
/// Pure function, defined for negative input (a negative fee rounds away from
/// zero too). Positivity of request amounts is enforced separately by
/// [`validate_positive`] - rejected, never clamped.
pub fn normalize(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject non-positive request amounts at the boundary.
pub fn validate_positive(amount: Decimal, field: &str) -> Result<(), PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::ValidationError {
            message: "amount must be greater than zero".to_string(),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("test decimal should parse")
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        assert_eq!(normalize(dec("10.005")), dec("10.01"));
        assert_eq!(normalize(dec("-10.005")), dec("-10.01"));
    }

    #[test]
    fn already_canonical_values_are_unchanged() {
        assert_eq!(normalize(dec("150.00")), dec("150.00"));
        assert_eq!(normalize(dec("145.50")), dec("145.50"));
    }

    #[test]
    fn sub_midpoint_rounds_down() {
        assert_eq!(normalize(dec("10.004")), dec("10.00"));
        assert_eq!(normalize(dec("10.0049")), dec("10.00"));
    }

    #[test]
    fn positive_validation() {
        assert!(validate_positive(dec("0.01"), "amount").is_ok());
        assert!(validate_positive(Decimal::ZERO, "amount").is_err());
        assert!(validate_positive(dec("-5"), "amount").is_err());
    }
}
