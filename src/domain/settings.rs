use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MARGIN_EXCHANGE_KEY: &str = "margen_exchange";
pub const FEE_PERCENTAGE_KEY: &str = "remittance_fee_percentage";

pub const DEFAULT_MARGIN_EXCHANGE: Decimal = dec!(1.0);
pub const DEFAULT_FEE_PERCENTAGE: Decimal = dec!(0.025);

/// Raw key/value pair as served by the settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
}

impl SettingEntry {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Pricing parameters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Multiplicative spread applied to displayed rates and spread conversions.
    pub margin_exchange: Decimal,
    /// Fractional fee charged on the sent amount, in `[0, 1)`.
    pub remittance_fee_percentage: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            margin_exchange: DEFAULT_MARGIN_EXCHANGE,
            remittance_fee_percentage: DEFAULT_FEE_PERCENTAGE,
        }
    }
}

/// Which keys fell back to their compiled-in default while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defaulted(pub Vec<&'static str>);

impl Settings {
    /// Parses the untyped payload, defaulting each missing, unparseable or
    /// out-of-range value independently.
    pub fn from_entries(entries: &[SettingEntry]) -> (Self, Defaulted) {
        let mut defaulted = Vec::new();

        let margin_exchange = match lookup(entries, MARGIN_EXCHANGE_KEY) {
            Some(value) if value > Decimal::ZERO => value,
            _ => {
                defaulted.push(MARGIN_EXCHANGE_KEY);
                DEFAULT_MARGIN_EXCHANGE
            }
        };

        let remittance_fee_percentage = match lookup(entries, FEE_PERCENTAGE_KEY) {
            Some(value) if value >= Decimal::ZERO && value < Decimal::ONE => value,
            _ => {
                defaulted.push(FEE_PERCENTAGE_KEY);
                DEFAULT_FEE_PERCENTAGE
            }
        };

        (
            Self {
                margin_exchange,
                remittance_fee_percentage,
            },
            Defaulted(defaulted),
        )
    }
}

fn lookup(entries: &[SettingEntry], key: &str) -> Option<Decimal> {
    entries
        .iter()
        .find(|entry| entry.key == key)
        .and_then(|entry| Decimal::from_str(entry.value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_both_keys() {
        let (settings, defaulted) = Settings::from_entries(&[
            SettingEntry::new(MARGIN_EXCHANGE_KEY, "0.97"),
            SettingEntry::new(FEE_PERCENTAGE_KEY, "0.03"),
        ]);
        assert_eq!(settings.margin_exchange, dec!(0.97));
        assert_eq!(settings.remittance_fee_percentage, dec!(0.03));
        assert!(defaulted.0.is_empty());
    }

    #[test]
    fn test_missing_and_garbage_values_default() {
        let (settings, defaulted) =
            Settings::from_entries(&[SettingEntry::new(MARGIN_EXCHANGE_KEY, "lots")]);
        assert_eq!(settings, Settings::default());
        assert_eq!(defaulted.0, vec![MARGIN_EXCHANGE_KEY, FEE_PERCENTAGE_KEY]);
    }

    #[test]
    fn test_out_of_range_values_default() {
        let (settings, defaulted) = Settings::from_entries(&[
            SettingEntry::new(MARGIN_EXCHANGE_KEY, "0"),
            SettingEntry::new(FEE_PERCENTAGE_KEY, "1"),
        ]);
        assert_eq!(settings, Settings::default());
        assert_eq!(defaulted.0.len(), 2);
    }
}
