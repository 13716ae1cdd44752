use crate::error::RemitError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Thousand separator accepted in user-typed amounts.
const THOUSAND_SEPARATOR: char = ',';

/// Represents a positive amount the user intends to send.
///
/// Wraps `rust_decimal::Decimal` so that fee and conversion math never runs
/// on binary floating point.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, RemitError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(RemitError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    /// Parses text as typed by the user, e.g. `"1,250.50"`.
    ///
    /// Returns `None` for empty, malformed or non-positive input.
    pub fn parse_text(text: &str) -> Option<Self> {
        parse_amount_text(text).and_then(|value| Self::new(value).ok())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = RemitError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_money(self.0))
    }
}

/// Strips thousand separators and parses the remainder as a decimal.
pub fn parse_amount_text(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != THOUSAND_SEPARATOR)
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Formats with two fractional digits, rounding half away from zero.
pub fn format_money(value: Decimal) -> String {
    let rounded =
        value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}
