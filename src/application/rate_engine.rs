use crate::application::settings_cache::SettingsCache;
use crate::domain::corridor::CorridorRegistry;
use crate::domain::ports::RateSourceBox;
use crate::domain::rates::RateSnapshot;
use crate::error::{RemitError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Period of the automatic rate reload.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(3_600_000);

/// Where the rate behind a conversion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RateOrigin {
    Snapshot,
    /// Corridor registry baseline; rates were unavailable for the currency.
    Baseline,
    /// Nothing known about the currency; 1.0 was assumed.
    Identity,
}

/// A rate or converted amount together with its worst input origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converted {
    pub value: Decimal,
    pub origin: RateOrigin,
}

impl Converted {
    /// Callers must not present identity-based numbers as real quotes.
    pub fn is_degraded(&self) -> bool {
        self.origin == RateOrigin::Identity
    }
}

/// Externally visible health of the rate cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateStatus {
    pub captured_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl RateStatus {
    /// "Rates unavailable, using fallback" indicator.
    pub fn using_fallback(&self) -> bool {
        self.captured_at.is_none() || self.last_error.is_some()
    }
}

#[derive(Default)]
struct RateState {
    snapshot: Option<Arc<RateSnapshot>>,
    last_error: Option<String>,
}

/// Owns the current rate snapshot and keeps it fresh.
///
/// Readers get an `Arc<RateSnapshot>` that is replaced wholesale on every
/// successful load, so conversions never wait on the network.
pub struct RateEngine {
    source: RateSourceBox,
    registry: Arc<CorridorRegistry>,
    settings: Arc<SettingsCache>,
    refresh_interval: Duration,
    state: RwLock<RateState>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RateEngine {
    pub fn new(
        source: RateSourceBox,
        registry: Arc<CorridorRegistry>,
        settings: Arc<SettingsCache>,
    ) -> Self {
        Self {
            source,
            registry,
            settings,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            state: RwLock::new(RateState::default()),
            timer: Mutex::new(None),
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn registry(&self) -> &CorridorRegistry {
        &self.registry
    }

    /// Fetches rates and replaces the snapshot.
    ///
    /// On failure the previous snapshot stays authoritative and the error is
    /// kept in [`RateEngine::status`] until the next successful load.
    pub async fn load(&self) -> Result<Arc<RateSnapshot>> {
        self.fetch(false).await
    }

    /// User-triggered load that bypasses request caches. The auto-refresh
    /// schedule is left as is.
    pub async fn refresh(&self) -> Result<Arc<RateSnapshot>> {
        self.fetch(true).await
    }

    async fn fetch(&self, bypass_cache: bool) -> Result<Arc<RateSnapshot>> {
        let quotes = match self.source.fetch_rates(bypass_cache).await {
            Ok(quotes) if quotes.is_empty() => {
                Err(RemitError::NetworkError("rate source returned no rates".into()))
            }
            other => other,
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match quotes {
            Ok(quotes) => {
                let (snapshot, rejected) = RateSnapshot::from_quotes(quotes, Utc::now());
                if !rejected.is_empty() {
                    tracing::warn!(count = rejected.len(), "dropped non-positive rate quotes");
                }
                tracing::info!(
                    currencies = snapshot.rates.len(),
                    bypass_cache,
                    "rate snapshot updated"
                );
                let snapshot = Arc::new(snapshot);
                state.snapshot = Some(snapshot.clone());
                state.last_error = None;
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!("rates unavailable, using fallback: {e}");
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Spawns the periodic reload. The first load happens immediately.
    ///
    /// The task only holds a weak reference, so dropping the last `Arc` to the
    /// engine ends it as well. Calling `start` twice replaces the old task.
    pub fn start(self: &Arc<Self>) {
        let engine: Weak<Self> = Arc::downgrade(self);
        let period = self.refresh_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(strong) = engine.upgrade() else {
                    break;
                };
                // Errors are recorded in the engine state by `load`.
                let _ = strong.load().await;
            }
        });
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancels the periodic reload, including a load in flight.
    pub fn stop(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            tracing::debug!("rate refresh stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn current_snapshot(&self) -> Option<Arc<RateSnapshot>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    pub fn status(&self) -> RateStatus {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        RateStatus {
            captured_at: state.snapshot.as_ref().map(|s| s.captured_at),
            last_error: state.last_error.clone(),
        }
    }

    /// Margin from the settings cache.
    pub fn margin(&self) -> Decimal {
        self.settings.current().margin_exchange
    }

    /// Rate to USD for one currency: snapshot, then baseline, then 1.0.
    pub fn rate_to_usd(&self, currency: &str) -> Converted {
        let snapshot = self.current_snapshot();
        self.rate_in(snapshot.as_deref(), currency)
    }

    /// Converts through USD: `amount / rate[from] * rate[to]`, times the
    /// margin when `apply_spread` is set. `None` if the result overflows.
    pub fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        apply_spread: bool,
    ) -> Option<Converted> {
        let margin = apply_spread.then(|| self.margin());
        self.convert_with_margin(amount, from, to, margin)
    }

    /// `rate[to] / rate[from]`, times the margin when `apply_spread` is set.
    pub fn spot_rate(&self, from: &str, to: &str, apply_spread: bool) -> Option<Converted> {
        let margin = apply_spread.then(|| self.margin());
        self.spot_rate_with_margin(from, to, margin)
    }

    pub fn convert_with_margin(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        margin: Option<Decimal>,
    ) -> Option<Converted> {
        let (from_rate, to_rate) = self.pair_rates(from, to);
        let value = amount
            .checked_div(from_rate.value)?
            .checked_mul(to_rate.value)?;
        Some(Converted {
            value: apply_margin(value, margin)?,
            origin: from_rate.origin.max(to_rate.origin),
        })
    }

    pub fn spot_rate_with_margin(
        &self,
        from: &str,
        to: &str,
        margin: Option<Decimal>,
    ) -> Option<Converted> {
        let (from_rate, to_rate) = self.pair_rates(from, to);
        let value = to_rate.value.checked_div(from_rate.value)?;
        Some(Converted {
            value: apply_margin(value, margin)?,
            origin: from_rate.origin.max(to_rate.origin),
        })
    }

    /// Rates to USD for both sides of a pair, taken from the same source: the
    /// snapshot when it knows both currencies, otherwise the registry baseline.
    pub fn pair_rates(&self, from: &str, to: &str) -> (Converted, Converted) {
        let snapshot = self.current_snapshot();
        if let Some(snapshot) = snapshot.as_deref()
            && let (Some(from_rate), Some(to_rate)) = (snapshot.rate(from), snapshot.rate(to))
        {
            return (
                Converted {
                    value: from_rate,
                    origin: RateOrigin::Snapshot,
                },
                Converted {
                    value: to_rate,
                    origin: RateOrigin::Snapshot,
                },
            );
        }
        (self.baseline(from), self.baseline(to))
    }

    fn rate_in(&self, snapshot: Option<&RateSnapshot>, currency: &str) -> Converted {
        match snapshot.and_then(|s| s.rate(currency)) {
            Some(value) => Converted {
                value,
                origin: RateOrigin::Snapshot,
            },
            None => self.baseline(currency),
        }
    }

    fn baseline(&self, currency: &str) -> Converted {
        match self.registry.baseline_rate(currency) {
            Some(value) => Converted {
                value,
                origin: RateOrigin::Baseline,
            },
            None => {
                tracing::warn!(currency, "no rate known, assuming identity");
                Converted {
                    value: Decimal::ONE,
                    origin: RateOrigin::Identity,
                }
            }
        }
    }
}

fn apply_margin(value: Decimal, margin: Option<Decimal>) -> Option<Decimal> {
    match margin {
        Some(margin) => value.checked_mul(margin),
        None => Some(value),
    }
}

impl Drop for RateEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
