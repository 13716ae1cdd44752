use crate::application::calculator::{CalculationResult, compute};
use crate::application::pipeline::{InFlight, SubmissionPipeline};
use crate::application::rate_engine::{RateEngine, RateStatus};
use crate::application::settings_cache::SettingsCache;
use crate::domain::beneficiary::Beneficiary;
use crate::domain::draft::{Step, TransactionDraft};
use crate::domain::ports::BeneficiaryStoreBox;
use crate::domain::remittance::ReceiptFile;
use crate::error::{RemitError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

struct DraftSlot {
    draft: TransactionDraft,
    /// Bumped whenever the draft is replaced or pre-filled; network results
    /// for an older generation are discarded.
    generation: u64,
}

/// One user's send flow: the draft, its pricing inputs and the pipeline that
/// settles it.
///
/// The draft lock is never held across network I/O. Upload and submit each
/// allow one call in flight; a second concurrent call gets `RemitError::Busy`,
/// and so does any draft edit while either is running.
pub struct RemittanceFlow {
    rates: Arc<RateEngine>,
    settings: Arc<SettingsCache>,
    pipeline: SubmissionPipeline,
    beneficiaries: BeneficiaryStoreBox,
    slot: Mutex<DraftSlot>,
    uploading: InFlight,
    submitting: InFlight,
    closed: AtomicBool,
}

impl RemittanceFlow {
    pub fn new(
        rates: Arc<RateEngine>,
        settings: Arc<SettingsCache>,
        pipeline: SubmissionPipeline,
        beneficiaries: BeneficiaryStoreBox,
    ) -> Self {
        Self::with_draft(
            rates,
            settings,
            pipeline,
            beneficiaries,
            TransactionDraft::new(),
        )
    }

    pub fn with_draft(
        rates: Arc<RateEngine>,
        settings: Arc<SettingsCache>,
        pipeline: SubmissionPipeline,
        beneficiaries: BeneficiaryStoreBox,
        draft: TransactionDraft,
    ) -> Self {
        Self {
            rates,
            settings,
            pipeline,
            beneficiaries,
            slot: Mutex::new(DraftSlot {
                draft,
                generation: 0,
            }),
            uploading: InFlight::default(),
            submitting: InFlight::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Loads settings and a first rate snapshot. A rate failure is not fatal:
    /// the returned status reports that fallback rates are in use.
    pub async fn prepare(&self) -> RateStatus {
        self.settings.load().await;
        if let Err(e) = self.rates.load().await {
            tracing::warn!("starting with fallback rates: {e}");
        }
        self.rates.status()
    }

    pub async fn draft(&self) -> TransactionDraft {
        self.slot.lock().await.draft.clone()
    }

    /// Applies a field edit (amount, corridor, recipient...) to the draft.
    pub async fn edit<R>(
        &self,
        f: impl FnOnce(&mut TransactionDraft) -> Result<R>,
    ) -> Result<R> {
        let mut slot = self.lock_idle("edit the draft").await?;
        f(&mut slot.draft)
    }

    pub async fn advance(&self) -> Result<Step> {
        let mut slot = self.lock_idle("advance").await?;
        let from = slot.draft.step();
        match slot.draft.advance(self.rates.registry()) {
            Ok(to) => {
                tracing::debug!(%from, %to, "draft advanced");
                Ok(to)
            }
            Err(e) => {
                tracing::debug!(step = %from, "transition blocked: {e}");
                Err(e)
            }
        }
    }

    pub async fn back(&self) -> Result<Step> {
        let mut slot = self.lock_idle("go back").await?;
        slot.draft.back()
    }

    /// Quote for the draft as it stands, with the session's settings.
    pub async fn quote(&self) -> Option<CalculationResult> {
        let slot = self.slot.lock().await;
        self.quote_for(&slot.draft)
    }

    fn quote_for(&self, draft: &TransactionDraft) -> Option<CalculationResult> {
        let settings = self.settings.current();
        compute(
            draft.amount_text(),
            draft.from_code(),
            draft.to_code(),
            &self.rates,
            settings.remittance_fee_percentage,
            settings.margin_exchange,
        )
    }

    pub async fn prefill(&self, beneficiary: &Beneficiary) -> Result<()> {
        let mut slot = self.lock_idle("pre-fill the draft").await?;
        slot.draft.prefill(beneficiary);
        slot.generation += 1;
        tracing::debug!(beneficiary = %beneficiary.id, "draft pre-filled");
        Ok(())
    }

    pub async fn prefill_saved(&self, beneficiary_id: &str) -> Result<()> {
        let beneficiary = self
            .beneficiaries
            .get(beneficiary_id)
            .await?
            .ok_or_else(|| {
                RemitError::ValidationError(format!("unknown beneficiary {beneficiary_id}"))
            })?;
        self.prefill(&beneficiary).await
    }

    pub async fn saved_beneficiaries(&self) -> Result<Vec<Beneficiary>> {
        self.beneficiaries.all().await
    }

    /// Discards the current draft and starts over, keeping the corridor.
    pub async fn new_transaction(&self) -> Result<()> {
        let mut slot = self.lock_idle("start a new transaction").await?;
        let fresh = match (slot.draft.from_code(), slot.draft.to_code()) {
            (Some(from), Some(to)) => TransactionDraft::with_corridor(from, to),
            _ => TransactionDraft::new(),
        };
        slot.draft = fresh;
        slot.generation += 1;
        Ok(())
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.is_active()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_active()
    }

    /// Uploads the payment proof and attaches its URL to the draft.
    pub async fn upload_receipt(&self, file: ReceiptFile) -> Result<String> {
        let _guard = self.uploading.try_begin("receipt upload")?;
        let generation = {
            let slot = self.lock_open("upload a receipt").await?;
            if self.submitting.is_active() {
                return Err(RemitError::Busy("submission"));
            }
            if slot.draft.step() != Step::Upload {
                return Err(RemitError::InvalidTransition {
                    step: slot.draft.step(),
                    action: "upload a receipt",
                });
            }
            slot.generation
        };

        let outcome = self.pipeline.upload_receipt(&file).await;

        let mut slot = self.lock_current(generation, "receipt upload").await?;
        SubmissionPipeline::apply_upload(&mut slot.draft, &file.file_name, outcome)
    }

    /// Posts the draft to the backend. Requires an uploaded receipt.
    pub async fn submit(&self) -> Result<String> {
        let _guard = self.submitting.try_begin("submission")?;
        let (draft, quote, generation) = {
            let mut slot = self.lock_open("submit").await?;
            if slot.draft.step() != Step::Upload {
                return Err(RemitError::InvalidTransition {
                    step: slot.draft.step(),
                    action: "submit",
                });
            }
            if !slot.draft.is_ready_to_submit() {
                return Err(RemitError::ValidationError(
                    "upload the payment receipt before submitting".to_string(),
                ));
            }
            slot.draft.check_amount(self.rates.registry())?;
            let quote = self.quote_for(&slot.draft).ok_or_else(|| {
                RemitError::ValidationError("amount cannot be priced".to_string())
            })?;
            (slot.draft.clone(), quote, slot.generation)
        };

        let outcome = self.pipeline.submit(&draft, &quote).await;

        let mut slot = match self.lock_current(generation, "submission").await {
            Ok(slot) => slot,
            // The backend took the money; the caller still gets the id.
            Err(stale) => {
                return match outcome {
                    Ok(receipt) => {
                        tracing::warn!(
                            transaction_id = %receipt.transaction_id,
                            "remittance accepted after the flow was closed"
                        );
                        Ok(receipt.transaction_id)
                    }
                    Err(_) => Err(stale),
                };
            }
        };
        let transaction_id = SubmissionPipeline::apply_submission(&mut slot.draft, outcome)?;
        let to_save = slot.draft.save_as_beneficiary().then(|| {
            Beneficiary::from_recipient(
                slot.draft.recipient(),
                slot.draft.to_code().map(str::to_string),
            )
        });
        drop(slot);

        if let Some(beneficiary) = to_save
            && let Err(e) = self.beneficiaries.save(beneficiary).await
        {
            tracing::warn!("could not save beneficiary: {e}");
        }
        Ok(transaction_id)
    }

    /// Marks the flow as disposed. Results still in flight no longer touch
    /// the draft; an accepted submission still returns its transaction id.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn lock_open(&self, action: &'static str) -> Result<MutexGuard<'_, DraftSlot>> {
        if self.is_closed() {
            return Err(RemitError::Closed(action));
        }
        Ok(self.slot.lock().await)
    }

    /// Like `lock_open`, but refuses while an upload or submission is in
    /// flight so the draft cannot change under it.
    async fn lock_idle(&self, action: &'static str) -> Result<MutexGuard<'_, DraftSlot>> {
        let slot = self.lock_open(action).await?;
        if self.submitting.is_active() {
            return Err(RemitError::Busy("submission"));
        }
        if self.uploading.is_active() {
            return Err(RemitError::Busy("receipt upload"));
        }
        Ok(slot)
    }

    async fn lock_current(
        &self,
        generation: u64,
        operation: &'static str,
    ) -> Result<MutexGuard<'_, DraftSlot>> {
        let slot = self.slot.lock().await;
        if self.is_closed() || slot.generation != generation {
            tracing::warn!(operation, "discarding result for a closed or replaced draft");
            return Err(RemitError::Stale(operation));
        }
        Ok(slot)
    }
}
