use crate::domain::beneficiary::Beneficiary;
use crate::domain::ports::{
    BeneficiaryStore, ObjectStore, RateSource, RemittanceBackend, SessionProvider, SettingsStore,
};
use crate::domain::rates::RateQuote;
use crate::domain::remittance::{
    ReceiptFile, RejectionCode, RemittanceReceipt, RemittanceRequest, Session,
};
use crate::domain::settings::SettingEntry;
use crate::error::{RemitError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Session provider with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionProvider {
    session: Option<Session>,
}

impl StaticSessionProvider {
    pub fn signed_in(access_token: &str, user_id: &str) -> Self {
        Self {
            session: Some(Session {
                access_token: access_token.to_string(),
                user_id: user_id.to_string(),
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn session(&self) -> Result<Option<Session>> {
        Ok(self.session.clone())
    }
}

/// Rate source serving a fixed list of quotes.
///
/// Counters and the failure switch are shared `Arc`s so tests can keep a
/// handle after boxing the source into an engine.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRateSource {
    quotes: Arc<RwLock<Vec<RateQuote>>>,
    failing: Arc<AtomicBool>,
    last_bypass: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryRateSource {
    pub fn new(quotes: Vec<RateQuote>) -> Self {
        Self {
            quotes: Arc::new(RwLock::new(quotes)),
            ..Self::default()
        }
    }

    pub async fn set_quotes(&self, quotes: Vec<RateQuote>) {
        *self.quotes.write().await = quotes;
    }

    pub fn failing_handle(&self) -> Arc<AtomicBool> {
        self.failing.clone()
    }

    pub fn bypass_handle(&self) -> Arc<AtomicBool> {
        self.last_bypass.clone()
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl RateSource for InMemoryRateSource {
    async fn fetch_rates(&self, bypass_cache: bool) -> Result<Vec<RateQuote>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_bypass.store(bypass_cache, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemitError::NetworkError("rate source unreachable".into()));
        }
        Ok(self.quotes.read().await.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySettingsStore {
    entries: Vec<SettingEntry>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemorySettingsStore {
    pub fn new(entries: Vec<SettingEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn fetch_settings(&self) -> Result<Vec<SettingEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemitError::NetworkError("settings store unreachable".into()));
        }
        Ok(self.entries.clone())
    }
}

/// Object store keeping uploads in memory under `memory://receipts/...` URLs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_handle(&self) -> Arc<AtomicBool> {
        self.failing.clone()
    }

    pub async fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(url).cloned()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, file: &ReceiptFile, session: &Session) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemitError::NetworkError("object store unreachable".into()));
        }
        let mut objects = self.objects.write().await;
        let url = format!(
            "memory://receipts/{}/{}-{}",
            session.user_id,
            objects.len() + 1,
            file.file_name
        );
        objects.insert(url.clone(), file.bytes.clone());
        Ok(url)
    }
}

/// Scripted outcome for the next call to [`InMemoryRemittanceBackend`].
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    Rejection { code: Option<String>, message: String },
    Transport(String),
}

#[derive(Default)]
struct BackendState {
    accepted: HashMap<uuid::Uuid, RemittanceReceipt>,
    requests: Vec<RemittanceRequest>,
    script: VecDeque<ScriptedFailure>,
}

/// Remittance backend that accepts everything unless a failure is scripted.
///
/// Requests are deduplicated by idempotency key: a retry of an accepted
/// request gets the original transaction id back.
#[derive(Clone, Default)]
pub struct InMemoryRemittanceBackend {
    state: Arc<RwLock<BackendState>>,
}

impl InMemoryRemittanceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_failure(&self, failure: ScriptedFailure) {
        self.state.write().await.script.push_back(failure);
    }

    /// Every request received, including rejected ones.
    pub async fn requests(&self) -> Vec<RemittanceRequest> {
        self.state.read().await.requests.clone()
    }

    pub async fn accepted_count(&self) -> usize {
        self.state.read().await.accepted.len()
    }
}

#[async_trait]
impl RemittanceBackend for InMemoryRemittanceBackend {
    async fn send(
        &self,
        request: &RemittanceRequest,
        _session: &Session,
    ) -> Result<RemittanceReceipt> {
        let mut state = self.state.write().await;
        state.requests.push(request.clone());

        if let Some(failure) = state.script.pop_front() {
            return Err(match failure {
                ScriptedFailure::Rejection { code, message } => RemitError::Rejected {
                    code: RejectionCode::classify(code.as_deref(), &message),
                    message,
                },
                ScriptedFailure::Transport(message) => RemitError::NetworkError(message),
            });
        }

        if let Some(existing) = state.accepted.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }
        let receipt = RemittanceReceipt {
            transaction_id: format!("TX-{:06}", state.accepted.len() + 1),
        };
        state
            .accepted
            .insert(request.idempotency_key, receipt.clone());
        Ok(receipt)
    }
}

/// A thread-safe in-memory store for saved beneficiaries.
#[derive(Default, Clone)]
pub struct InMemoryBeneficiaryStore {
    beneficiaries: Arc<RwLock<HashMap<String, Beneficiary>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryBeneficiaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_handle(&self) -> Arc<AtomicBool> {
        self.failing.clone()
    }
}

#[async_trait]
impl BeneficiaryStore for InMemoryBeneficiaryStore {
    async fn save(&self, beneficiary: Beneficiary) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemitError::IoError(std::io::Error::other(
                "beneficiary store unavailable",
            )));
        }
        let mut beneficiaries = self.beneficiaries.write().await;
        beneficiaries.insert(beneficiary.id.clone(), beneficiary);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Beneficiary>> {
        let beneficiaries = self.beneficiaries.read().await;
        Ok(beneficiaries.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Beneficiary>> {
        let beneficiaries = self.beneficiaries.read().await;
        let mut all: Vec<Beneficiary> = beneficiaries.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn session() -> Session {
        Session {
            access_token: "token".into(),
            user_id: "user-1".into(),
        }
    }

    fn request(key: Uuid) -> RemittanceRequest {
        RemittanceRequest {
            user_id: "user-1".into(),
            amount_sent: dec!(100),
            currency_sent: "USD".into(),
            amount_received: dec!(3650),
            currency_received: "VES".into(),
            fee: dec!(2.5),
            from_country_code: "US".into(),
            to_country_code: "VE".into(),
            recipient_name: "Ana".into(),
            recipient_bank: "Banesco".into(),
            recipient_account: "0134".into(),
            recipient_id: "V1".into(),
            receipt_url: "memory://r".into(),
            idempotency_key: key,
        }
    }

    #[tokio::test]
    async fn test_backend_deduplicates_by_idempotency_key() {
        let backend = InMemoryRemittanceBackend::new();
        let key = Uuid::new_v4();

        let first = backend.send(&request(key), &session()).await.unwrap();
        let retry = backend.send(&request(key), &session()).await.unwrap();
        let other = backend
            .send(&request(Uuid::new_v4()), &session())
            .await
            .unwrap();

        assert_eq!(first, retry);
        assert_ne!(first, other);
        assert_eq!(backend.accepted_count().await, 2);
        assert_eq!(backend.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_backend_scripted_rejection() {
        let backend = InMemoryRemittanceBackend::new();
        backend
            .push_failure(ScriptedFailure::Rejection {
                code: None,
                message: "monto mínimo no alcanzado".into(),
            })
            .await;

        let err = backend
            .send(&request(Uuid::new_v4()), &session())
            .await
            .unwrap_err();
        assert!(err.is_min_amount_rejection());
        assert_eq!(backend.accepted_count().await, 0);
    }

    #[tokio::test]
    async fn test_object_store_roundtrip() {
        let store = InMemoryObjectStore::new();
        let file = ReceiptFile::new("proof.pdf", "application/pdf", vec![1, 2, 3]);
        let url = store.upload(&file, &session()).await.unwrap();
        assert!(url.starts_with("memory://receipts/user-1/"));
        assert_eq!(store.get(&url).await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_beneficiary_store() {
        let store = InMemoryBeneficiaryStore::new();
        let beneficiary = Beneficiary {
            id: "b1".into(),
            name: "Ana".into(),
            bank: "Banesco".into(),
            account_number: "0134".into(),
            document_id: "V1".into(),
            country_code: Some("VE".into()),
        };
        store.save(beneficiary.clone()).await.unwrap();

        assert_eq!(store.get("b1").await.unwrap(), Some(beneficiary));
        assert!(store.get("b2").await.unwrap().is_none());
        assert_eq!(store.all().await.unwrap().len(), 1);
    }
}
