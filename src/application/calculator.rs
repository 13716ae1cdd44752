//! Fee and conversion math shown to the user before and during a transfer.

use crate::application::rate_engine::RateEngine;
use crate::domain::amount::{Amount, format_money};
use crate::domain::corridor::ArrivalTime;
use crate::domain::rates::BASE_CURRENCY;
use rust_decimal::Decimal;
use serde::Serialize;

/// Derived quote for the current draft inputs. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    pub amount: Decimal,
    pub fee: Decimal,
    /// What the sender pays: amount plus fee.
    pub total: Decimal,
    pub from_currency: String,
    /// Unadjusted conversion of `amount`; the margin is not applied here.
    /// Rates come from the live snapshot when it holds both currencies and
    /// from each corridor's `baseline_rate_to_usd` otherwise.
    pub received_amount: Decimal,
    pub received_currency: String,
    /// Spread-adjusted unit rate behind `exchange_rate_text`.
    pub exchange_rate: Decimal,
    pub exchange_rate_text: String,
    pub arrival_time: ArrivalTime,
    /// Some rate fell back to the 1.0 identity.
    pub degraded: bool,
}

/// Computes fee, total and converted amount for a corridor.
///
/// Returns `None` when either corridor code is unset or unknown, when
/// `amount_text` does not parse to a positive number, or when the amount is
/// too large to price without overflowing. Depends only on its
/// arguments and the engine's current snapshot.
pub fn compute(
    amount_text: &str,
    from_code: Option<&str>,
    to_code: Option<&str>,
    rates: &RateEngine,
    fee_pct: Decimal,
    margin: Decimal,
) -> Option<CalculationResult> {
    let registry = rates.registry();
    let origin = registry.get(from_code?)?;
    let destination = registry.get(to_code?)?;
    let amount = Amount::parse_text(amount_text)?.value();

    let fee = amount.checked_mul(fee_pct)?;
    let total = amount.checked_add(fee)?;

    let (from_rate, to_rate) = rates.pair_rates(&origin.currency, &destination.currency);
    let amount_in_usd = if origin.currency == BASE_CURRENCY {
        amount
    } else {
        amount.checked_div(from_rate.value)?
    };
    let received_amount = amount_in_usd.checked_mul(to_rate.value)?;

    let spot =
        rates.spot_rate_with_margin(&origin.currency, &destination.currency, Some(margin))?;
    let exchange_rate_text = format!(
        "1 {} = {} {}",
        origin.currency,
        format_rate(spot.value),
        destination.currency
    );

    Some(CalculationResult {
        amount,
        fee,
        total,
        from_currency: origin.currency.clone(),
        received_amount,
        received_currency: destination.currency.clone(),
        exchange_rate: spot.value,
        exchange_rate_text,
        arrival_time: destination.region.arrival_time(),
        degraded: from_rate.is_degraded() || to_rate.is_degraded() || spot.is_degraded(),
    })
}

/// Rates below one need more digits to stay meaningful.
fn format_rate(rate: Decimal) -> String {
    if rate >= Decimal::ONE {
        format_money(rate)
    } else {
        format!("{:.6}", rate.round_dp(6))
    }
}
