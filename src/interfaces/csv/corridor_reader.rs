use crate::domain::corridor::{CorridorEntry, CorridorRegistry, Region};
use crate::error::{RemitError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

const PAYOUT_METHOD_SEPARATOR: char = '|';

/// One CSV row; `payout_methods` is a `|`-separated list.
#[derive(Debug, Deserialize)]
struct CorridorRow {
    code: String,
    currency: String,
    baseline_rate_to_usd: Decimal,
    minimum_send_amount: Decimal,
    region: Region,
    #[serde(default)]
    payout_methods: String,
}

impl From<CorridorRow> for CorridorEntry {
    fn from(row: CorridorRow) -> Self {
        Self {
            code: row.code.to_uppercase(),
            currency: row.currency.to_uppercase(),
            baseline_rate_to_usd: row.baseline_rate_to_usd,
            minimum_send_amount: row.minimum_send_amount,
            region: row.region,
            payout_methods: row
                .payout_methods
                .split(PAYOUT_METHOD_SEPARATOR)
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Reads a corridor catalog from a CSV source.
///
/// Header: `code,currency,baseline_rate_to_usd,minimum_send_amount,region,payout_methods`.
pub struct CorridorReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CorridorReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes entries; each malformed row yields an error.
    pub fn entries(self) -> impl Iterator<Item = Result<CorridorEntry>> {
        self.reader
            .into_deserialize::<CorridorRow>()
            .map(|result| result.map(CorridorEntry::from).map_err(RemitError::from))
    }

    /// Reads the whole catalog into a validated registry.
    pub fn into_registry(self) -> Result<CorridorRegistry> {
        let entries = self.entries().collect::<Result<Vec<_>>>()?;
        if entries.is_empty() {
            return Err(RemitError::ValidationError(
                "corridor catalog is empty".to_string(),
            ));
        }
        CorridorRegistry::from_entries(entries)
    }
}
