use crate::error::{RemitError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Geographic grouping of a country; drives the delivery-time estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "latam")]
    LatAm,
    #[serde(rename = "north_america")]
    NorthAmerica,
    #[serde(rename = "europe")]
    Europe,
    #[serde(rename = "intl")]
    Intl,
}

/// How long a payout takes to reach the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArrivalTime {
    Instant,
    TwoBusinessDays,
}

impl Region {
    pub fn arrival_time(&self) -> ArrivalTime {
        match self {
            Region::LatAm => ArrivalTime::Instant,
            _ => ArrivalTime::TwoBusinessDays,
        }
    }
}

impl fmt::Display for ArrivalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrivalTime::Instant => f.write_str("instant"),
            ArrivalTime::TwoBusinessDays => f.write_str("2 business days"),
        }
    }
}

/// One country a remittance can be sent from or to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorEntry {
    /// ISO country code, unique within a registry.
    pub code: String,
    /// ISO currency code; several countries may share one.
    pub currency: String,
    /// Units of `currency` per US dollar, used when live rates are missing.
    pub baseline_rate_to_usd: Decimal,
    /// Smallest amount (in `currency`) accepted as origin of a transfer.
    pub minimum_send_amount: Decimal,
    pub region: Region,
    pub payout_methods: Vec<String>,
}

impl CorridorEntry {
    fn builtin(
        code: &str,
        currency: &str,
        baseline_rate_to_usd: Decimal,
        minimum_send_amount: Decimal,
        region: Region,
        payout_methods: &[&str],
    ) -> Self {
        Self {
            code: code.to_string(),
            currency: currency.to_string(),
            baseline_rate_to_usd,
            minimum_send_amount,
            region,
            payout_methods: payout_methods.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Immutable catalog of supported countries, keyed by country code.
#[derive(Debug, Clone)]
pub struct CorridorRegistry {
    entries: Vec<CorridorEntry>,
    by_code: HashMap<String, usize>,
}

impl CorridorRegistry {
    /// Builds a registry, rejecting duplicate codes and out-of-range numbers.
    pub fn from_entries(entries: Vec<CorridorEntry>) -> Result<Self> {
        let mut by_code = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if entry.baseline_rate_to_usd <= Decimal::ZERO {
                return Err(RemitError::ValidationError(format!(
                    "corridor {} has a non-positive baseline rate",
                    entry.code
                )));
            }
            if entry.minimum_send_amount < Decimal::ZERO {
                return Err(RemitError::ValidationError(format!(
                    "corridor {} has a negative minimum send amount",
                    entry.code
                )));
            }
            if by_code.insert(entry.code.clone(), idx).is_some() {
                return Err(RemitError::ValidationError(format!(
                    "duplicate corridor code {}",
                    entry.code
                )));
            }
        }
        Ok(Self { entries, by_code })
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Self {
        use Region::*;
        let bank = "bank_transfer";
        let cash = "cash_pickup";
        let wallet = "mobile_wallet";
        let entries = vec![
            CorridorEntry::builtin("US", "USD", dec!(1.0), dec!(20), NorthAmerica, &[bank]),
            CorridorEntry::builtin("CA", "CAD", dec!(1.36), dec!(25), NorthAmerica, &[bank]),
            CorridorEntry::builtin("MX", "MXN", dec!(17.10), dec!(350), LatAm, &[bank, cash]),
            CorridorEntry::builtin("VE", "VES", dec!(36.5), dec!(0), LatAm, &[bank, wallet]),
            CorridorEntry::builtin("CO", "COP", dec!(3950), dec!(80000), LatAm, &[bank, cash]),
            CorridorEntry::builtin("PE", "PEN", dec!(3.75), dec!(75), LatAm, &[bank]),
            CorridorEntry::builtin("CL", "CLP", dec!(905), dec!(18000), LatAm, &[bank]),
            CorridorEntry::builtin("AR", "ARS", dec!(850), dec!(17000), LatAm, &[bank, cash]),
            CorridorEntry::builtin("BR", "BRL", dec!(4.95), dec!(100), LatAm, &[bank, wallet]),
            CorridorEntry::builtin("PA", "USD", dec!(1.0), dec!(20), LatAm, &[bank]),
            CorridorEntry::builtin("ES", "EUR", dec!(0.92), dec!(20), Europe, &[bank]),
            CorridorEntry::builtin("IT", "EUR", dec!(0.92), dec!(20), Europe, &[bank]),
            CorridorEntry::builtin("PT", "EUR", dec!(0.92), dec!(20), Europe, &[bank]),
            CorridorEntry::builtin("GB", "GBP", dec!(0.79), dec!(20), Europe, &[bank]),
            CorridorEntry::builtin("PH", "PHP", dec!(56.2), dec!(1000), Intl, &[bank, cash]),
            CorridorEntry::builtin("CN", "CNY", dec!(7.24), dec!(150), Intl, &[bank]),
        ];
        // The literal catalog above has unique codes and positive rates.
        let by_code = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.code.clone(), idx))
            .collect();
        Self { entries, by_code }
    }

    pub fn get(&self, code: &str) -> Option<&CorridorEntry> {
        self.by_code.get(code).map(|idx| &self.entries[*idx])
    }

    /// Baseline rate for a currency, taken from the first country using it.
    pub fn baseline_rate(&self, currency: &str) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|entry| entry.currency == currency)
            .map(|entry| entry.baseline_rate_to_usd)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorridorEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CorridorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
