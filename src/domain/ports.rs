use super::beneficiary::Beneficiary;
use super::rates::RateQuote;
use super::remittance::{ReceiptFile, RemittanceReceipt, RemittanceRequest, Session};
use super::settings::SettingEntry;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// `None` when nobody is signed in.
    async fn session(&self) -> Result<Option<Session>>;
}

#[async_trait]
pub trait RateSource: Send + Sync {
    /// `bypass_cache` asks for fresh data on user-triggered refreshes.
    async fn fetch_rates(&self, bypass_cache: bool) -> Result<Vec<RateQuote>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn fetch_settings(&self) -> Result<Vec<SettingEntry>>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the file and returns a URL the backend can retrieve it from.
    async fn upload(&self, file: &ReceiptFile, session: &Session) -> Result<String>;
}

#[async_trait]
pub trait RemittanceBackend: Send + Sync {
    async fn send(
        &self,
        request: &RemittanceRequest,
        session: &Session,
    ) -> Result<RemittanceReceipt>;
}

#[async_trait]
pub trait BeneficiaryStore: Send + Sync {
    async fn save(&self, beneficiary: Beneficiary) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Beneficiary>>;
    async fn all(&self) -> Result<Vec<Beneficiary>>;
}

pub type SessionProviderBox = Box<dyn SessionProvider>;
pub type RateSourceBox = Box<dyn RateSource>;
pub type SettingsStoreBox = Box<dyn SettingsStore>;
pub type ObjectStoreBox = Box<dyn ObjectStore>;
pub type RemittanceBackendBox = Box<dyn RemittanceBackend>;
pub type BeneficiaryStoreBox = Box<dyn BeneficiaryStore>;
