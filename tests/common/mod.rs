#![allow(dead_code)]

use remitflow::application::flow::RemittanceFlow;
use remitflow::application::pipeline::SubmissionPipeline;
use remitflow::application::rate_engine::RateEngine;
use remitflow::application::settings_cache::SettingsCache;
use remitflow::domain::corridor::CorridorRegistry;
use remitflow::domain::draft::Recipient;
use remitflow::domain::rates::RateQuote;
use remitflow::domain::remittance::ReceiptFile;
use remitflow::domain::settings::SettingEntry;
use remitflow::infrastructure::in_memory::{
    InMemoryBeneficiaryStore, InMemoryObjectStore, InMemoryRateSource, InMemoryRemittanceBackend,
    InMemorySettingsStore, StaticSessionProvider,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub fn quote(currency: &str, rate: Decimal) -> RateQuote {
    RateQuote {
        currency: currency.to_string(),
        rate_to_usd: rate,
    }
}

pub fn recipient() -> Recipient {
    Recipient {
        name: "Ana Pérez".into(),
        bank: "Banesco".into(),
        account_number: "01340000000000000001".into(),
        document_id: "V12345678".into(),
    }
}

pub fn receipt() -> ReceiptFile {
    ReceiptFile::new("proof.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47])
}

/// Handles on the in-memory adapters behind a flow.
pub struct Harness {
    pub flow: Arc<RemittanceFlow>,
    pub rates: Arc<RateEngine>,
    pub rate_source: InMemoryRateSource,
    pub object_store: InMemoryObjectStore,
    pub backend: InMemoryRemittanceBackend,
    pub beneficiaries: InMemoryBeneficiaryStore,
}

pub struct HarnessBuilder {
    quotes: Vec<RateQuote>,
    settings: Vec<SettingEntry>,
    sessions: StaticSessionProvider,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            quotes: vec![quote("VES", dec!(36.5)), quote("EUR", dec!(0.92))],
            settings: vec![
                SettingEntry::new("margen_exchange", "1.0"),
                SettingEntry::new("remittance_fee_percentage", "0.025"),
            ],
            sessions: StaticSessionProvider::signed_in("token", "user-1"),
        }
    }
}

impl HarnessBuilder {
    pub fn quotes(mut self, quotes: Vec<RateQuote>) -> Self {
        self.quotes = quotes;
        self
    }

    pub fn settings(mut self, settings: Vec<SettingEntry>) -> Self {
        self.settings = settings;
        self
    }

    pub fn signed_out(mut self) -> Self {
        self.sessions = StaticSessionProvider::signed_out();
        self
    }

    pub async fn build(self) -> Harness {
        let rate_source = InMemoryRateSource::new(self.quotes);
        let object_store = InMemoryObjectStore::new();
        let backend = InMemoryRemittanceBackend::new();
        let beneficiaries = InMemoryBeneficiaryStore::new();

        let settings = Arc::new(SettingsCache::new(Box::new(InMemorySettingsStore::new(
            self.settings,
        ))));
        let rates = Arc::new(RateEngine::new(
            Box::new(rate_source.clone()),
            Arc::new(CorridorRegistry::builtin()),
            settings.clone(),
        ));
        let pipeline = SubmissionPipeline::new(
            Box::new(self.sessions),
            Box::new(object_store.clone()),
            Box::new(backend.clone()),
        );
        let flow = Arc::new(RemittanceFlow::new(
            rates.clone(),
            settings,
            pipeline,
            Box::new(beneficiaries.clone()),
        ));
        flow.prepare().await;

        Harness {
            flow,
            rates,
            rate_source,
            object_store,
            backend,
            beneficiaries,
        }
    }
}

/// Fills amount and recipient for `from -> to` and walks the flow to Upload.
pub async fn walk_to_upload(flow: &RemittanceFlow, from: &str, to: &str, amount: &str) {
    flow.edit(|draft| {
        draft.set_corridor(from, to)?;
        draft.set_amount_text(amount)?;
        draft.set_recipient(recipient())
    })
    .await
    .unwrap();
    for _ in 0..3 {
        flow.advance().await.unwrap();
    }
}
