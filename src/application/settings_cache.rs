use crate::domain::ports::SettingsStoreBox;
use crate::domain::settings::Settings;
use tokio::sync::OnceCell;

/// Loads pricing settings once per session.
///
/// Until `load` has completed, and whenever the store is unavailable, the
/// compiled-in defaults are served.
pub struct SettingsCache {
    store: SettingsStoreBox,
    fallback: Settings,
    loaded: OnceCell<Settings>,
}

impl SettingsCache {
    pub fn new(store: SettingsStoreBox) -> Self {
        Self::with_fallback(store, Settings::default())
    }

    pub fn with_fallback(store: SettingsStoreBox, fallback: Settings) -> Self {
        Self {
            store,
            fallback,
            loaded: OnceCell::new(),
        }
    }

    /// Fetches and parses settings on first call; later calls reuse the result.
    pub async fn load(&self) -> Settings {
        *self
            .loaded
            .get_or_init(|| async {
                match self.store.fetch_settings().await {
                    Ok(entries) => {
                        let (settings, defaulted) = Settings::from_entries(&entries);
                        if !defaulted.0.is_empty() {
                            tracing::warn!(keys = ?defaulted.0, "settings missing or invalid, using defaults");
                        }
                        tracing::info!(
                            margin = %settings.margin_exchange,
                            fee = %settings.remittance_fee_percentage,
                            "settings loaded"
                        );
                        settings
                    }
                    Err(e) => {
                        tracing::warn!("settings unavailable, using defaults: {e}");
                        self.fallback
                    }
                }
            })
            .await
    }

    /// Settings currently in effect, without touching the store.
    pub fn current(&self) -> Settings {
        self.loaded.get().copied().unwrap_or(self.fallback)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::{FEE_PERCENTAGE_KEY, MARGIN_EXCHANGE_KEY, SettingEntry};
    use crate::infrastructure::in_memory::InMemorySettingsStore;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_defaults_before_load() {
        let cache = SettingsCache::new(Box::new(InMemorySettingsStore::new(vec![])));
        assert_eq!(cache.current(), Settings::default());
        assert!(!cache.is_loaded());
    }

    #[tokio::test]
    async fn test_loads_once() {
        let store = InMemorySettingsStore::new(vec![
            SettingEntry::new(MARGIN_EXCHANGE_KEY, "0.98"),
            SettingEntry::new(FEE_PERCENTAGE_KEY, "0.03"),
        ]);
        let calls = store.calls();
        let cache = SettingsCache::new(Box::new(store));

        let first = cache.load().await;
        let second = cache.load().await;

        assert_eq!(first, second);
        assert_eq!(first.margin_exchange, dec!(0.98));
        assert_eq!(cache.current().remittance_fee_percentage, dec!(0.03));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_failure_uses_fallback() {
        let store = InMemorySettingsStore::new(vec![]);
        store.set_failing(true);
        let cache = SettingsCache::new(Box::new(store));
        assert_eq!(cache.load().await, Settings::default());
        assert!(cache.is_loaded());
    }
}
