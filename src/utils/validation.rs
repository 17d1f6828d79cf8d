//! Validation utilities

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate};
use std::str::FromStr;

use crate::types::*;

/// Parse the date a receipt was received.
///
/// Accepts RFC 2822 email `Date` headers (the calendar date is taken in the
/// header's own offset), RFC 3339 timestamps and plain `YYYY-MM-DD` dates.
pub fn parse_observed_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::InvalidDate("empty date".to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc2822(raw) {
        return Ok(datetime.date_naive());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.date_naive());
    }

    Err(ValidationError::InvalidDate(raw.to_string()))
}

/// Convert a floating point amount into an exact decimal.
///
/// Uses the shortest decimal rendering of the float so `19.99` stays `19.99`.
pub fn decimal_from_f64(value: f64, field: &str) -> Result<BigDecimal, ValidationError> {
    let non_finite = || ValidationError::NonFiniteAmount {
        field: field.to_string(),
        value: value.to_string(),
    };
    if !value.is_finite() {
        return Err(non_finite());
    }
    BigDecimal::from_str(&value.to_string()).map_err(|_| non_finite())
}

/// Parse a ledger amount such as `-42.50`, `$1,204.00` or `-$3.10`
pub fn parse_amount(raw: &str) -> Option<BigDecimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    BigDecimal::from_str(&cleaned).ok()
}

/// Validate that a merchant name is usable for matching
pub fn validate_merchant(merchant: &str) -> Result<(), ValidationError> {
    if merchant.trim().is_empty() {
        return Err(ValidationError::EmptyMerchant);
    }
    Ok(())
}

/// Validate a receipt before it reaches the matcher
pub fn validate_receipt(receipt: &Receipt) -> Result<(), ValidationError> {
    validate_merchant(&receipt.merchant)?;

    for item in &receipt.items {
        if item.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(item.name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_date_header() {
        let date = parse_observed_date("Fri, 12 Jan 2024 22:15:03 -0500").unwrap();
        // Stays on the sender's calendar day rather than rolling over to UTC
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
    }

    #[test]
    fn test_parse_plain_and_rfc3339_dates() {
        assert_eq!(
            parse_observed_date("2024-01-12").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
        assert_eq!(
            parse_observed_date("2024-01-12T08:00:00+02:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
    }

    #[test]
    fn test_invalid_date_is_validation_error() {
        assert!(matches!(
            parse_observed_date("yesterday"),
            Err(ValidationError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_observed_date("2024-02-30"),
            Err(ValidationError::InvalidDate(_))
        ));
        assert!(parse_observed_date("   ").is_err());
    }

    #[test]
    fn test_decimal_from_f64() {
        assert_eq!(
            decimal_from_f64(19.99, "total_billed").unwrap(),
            BigDecimal::from_str("19.99").unwrap()
        );
        assert!(matches!(
            decimal_from_f64(f64::NAN, "total_billed"),
            Err(ValidationError::NonFiniteAmount { .. })
        ));
        assert!(decimal_from_f64(f64::INFINITY, "total_cost").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            parse_amount("-42.50"),
            Some(BigDecimal::from_str("-42.5").unwrap())
        );
        assert_eq!(
            parse_amount("$1,204.00"),
            Some(BigDecimal::from_str("1204").unwrap())
        );
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_validate_receipt() {
        let receipt = Receipt::new("Bombas", BigDecimal::from(12));
        assert!(validate_receipt(&receipt).is_ok());

        let blank = Receipt::new("  ", BigDecimal::from(12));
        assert_eq!(validate_receipt(&blank), Err(ValidationError::EmptyMerchant));

        let zero_qty =
            receipt.item(LineItem::new("Socks", BigDecimal::from(12)).quantity(0));
        assert!(matches!(
            validate_receipt(&zero_qty),
            Err(ValidationError::InvalidQuantity(_))
        ));
    }
}
