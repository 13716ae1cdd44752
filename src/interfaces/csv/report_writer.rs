use crate::application::calculator::CalculationResult;
use crate::domain::amount::format_money;
use crate::domain::corridor::CorridorEntry;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct QuoteRow<'a> {
    from: &'a str,
    to: &'a str,
    amount: String,
    fee: String,
    total: String,
    currency: &'a str,
    received: String,
    received_currency: &'a str,
    rate: &'a str,
    arrival: String,
    degraded: bool,
}

#[derive(Serialize)]
struct CorridorRow<'a> {
    code: &'a str,
    currency: &'a str,
    baseline_rate_to_usd: String,
    minimum_send_amount: String,
    region: String,
    payout_methods: String,
}

/// Writes quotes and catalogs as CSV, amounts with two decimals.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_quote(&mut self, from: &str, to: &str, quote: &CalculationResult) -> Result<()> {
        self.writer.serialize(QuoteRow {
            from,
            to,
            amount: format_money(quote.amount),
            fee: format_money(quote.fee),
            total: format_money(quote.total),
            currency: &quote.from_currency,
            received: format_money(quote.received_amount),
            received_currency: &quote.received_currency,
            rate: &quote.exchange_rate_text,
            arrival: quote.arrival_time.to_string(),
            degraded: quote.degraded,
        })?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_corridors<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a CorridorEntry>,
    ) -> Result<()> {
        for entry in entries {
            self.writer.serialize(CorridorRow {
                code: &entry.code,
                currency: &entry.currency,
                baseline_rate_to_usd: entry.baseline_rate_to_usd.normalize().to_string(),
                minimum_send_amount: entry.minimum_send_amount.normalize().to_string(),
                region: format!("{:?}", entry.region),
                payout_methods: entry.payout_methods.join("|"),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
