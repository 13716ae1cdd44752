use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const BASE_CURRENCY: &str = "USD";

/// One entry of the rate source's `GET /rates` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub currency: String,
    #[serde(rename = "rateToUSD")]
    pub rate_to_usd: Decimal,
}

/// Immutable point-in-time set of rates relative to `base_currency`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub base_currency: String,
    pub rates: HashMap<String, Decimal>,
    pub captured_at: DateTime<Utc>,
}

impl RateSnapshot {
    /// Normalizes raw quotes into a USD-based snapshot.
    ///
    /// Non-positive quotes are dropped and returned separately so the caller
    /// can report them. The base currency is always present with rate 1.
    pub fn from_quotes(
        quotes: Vec<RateQuote>,
        captured_at: DateTime<Utc>,
    ) -> (Self, Vec<RateQuote>) {
        let mut rates = HashMap::with_capacity(quotes.len() + 1);
        let mut rejected = Vec::new();
        for quote in quotes {
            if quote.rate_to_usd > Decimal::ZERO {
                rates.insert(quote.currency.to_uppercase(), quote.rate_to_usd);
            } else {
                rejected.push(quote);
            }
        }
        rates.insert(BASE_CURRENCY.to_string(), Decimal::ONE);
        let snapshot = Self {
            base_currency: BASE_CURRENCY.to_string(),
            rates,
            captured_at,
        };
        (snapshot, rejected)
    }

    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(currency: &str, rate: Decimal) -> RateQuote {
        RateQuote {
            currency: currency.to_string(),
            rate_to_usd: rate,
        }
    }

    #[test]
    fn test_snapshot_drops_non_positive_rates() {
        let (snapshot, rejected) = RateSnapshot::from_quotes(
            vec![quote("VES", dec!(36.5)), quote("COP", dec!(0)), quote("ARS", dec!(-1))],
            Utc::now(),
        );
        assert_eq!(snapshot.rate("VES"), Some(dec!(36.5)));
        assert_eq!(snapshot.rate("COP"), None);
        assert_eq!(rejected.len(), 2);
    }

    #[test]
    fn test_snapshot_always_has_base() {
        let (snapshot, _) = RateSnapshot::from_quotes(vec![], Utc::now());
        assert_eq!(snapshot.base_currency, "USD");
        assert_eq!(snapshot.rate("USD"), Some(Decimal::ONE));
    }

    #[test]
    fn test_quote_wire_format() {
        let quotes: Vec<RateQuote> =
            serde_json::from_str(r#"[{"currency":"VES","rateToUSD":36.5}]"#).unwrap();
        assert_eq!(quotes[0], quote("VES", dec!(36.5)));
    }
}
