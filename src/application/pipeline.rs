use crate::application::calculator::CalculationResult;
use crate::domain::draft::TransactionDraft;
use crate::domain::ports::{ObjectStoreBox, RemittanceBackendBox, SessionProviderBox};
use crate::domain::remittance::{ReceiptFile, RemittanceReceipt, RemittanceRequest, Session};
use crate::error::{RemitError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Re-entry flag for one kind of network operation.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    /// Claims the flag, failing fast if the operation is already running.
    pub fn try_begin(&self, operation: &'static str) -> Result<InFlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RemitError::Busy(operation))?;
        Ok(InFlightGuard(&self.0))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the flag when dropped, including when the owning future is.
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Uploads payment proof and posts the remittance to the backend.
///
/// The network half (`upload_receipt`, `submit`) works on copies of the
/// draft; the `apply_*` half interprets the outcome and moves the draft.
pub struct SubmissionPipeline {
    sessions: SessionProviderBox,
    object_store: ObjectStoreBox,
    backend: RemittanceBackendBox,
}

impl SubmissionPipeline {
    pub fn new(
        sessions: SessionProviderBox,
        object_store: ObjectStoreBox,
        backend: RemittanceBackendBox,
    ) -> Self {
        Self {
            sessions,
            object_store,
            backend,
        }
    }

    async fn require_session(&self) -> Result<Session> {
        self.sessions.session().await?.ok_or(RemitError::NoSession)
    }

    pub async fn upload_receipt(&self, file: &ReceiptFile) -> Result<String> {
        let session = self.require_session().await?;
        tracing::info!(file = %file.file_name, size = file.bytes.len(), "uploading receipt");
        self.object_store.upload(file, &session).await
    }

    pub async fn submit(
        &self,
        draft: &TransactionDraft,
        quote: &CalculationResult,
    ) -> Result<RemittanceReceipt> {
        let session = self.require_session().await?;
        let request = build_request(draft, quote, &session.user_id)?;
        tracing::info!(
            idempotency_key = %request.idempotency_key,
            from = %request.from_country_code,
            to = %request.to_country_code,
            "submitting remittance"
        );
        self.backend.send(&request, &session).await
    }

    /// Stores the receipt URL on success; a failure leaves the step as is so
    /// the user can retry.
    pub fn apply_upload(
        draft: &mut TransactionDraft,
        file_name: &str,
        outcome: Result<String>,
    ) -> Result<String> {
        match outcome {
            Ok(url) => {
                draft.record_receipt(file_name, url.clone())?;
                Ok(url)
            }
            Err(e) => {
                tracing::warn!("receipt upload failed: {e}");
                Err(e)
            }
        }
    }

    /// Moves the draft according to the backend's answer.
    ///
    /// * accepted: `Success` with the transaction id.
    /// * minimum-amount rejection: same step, amount field error.
    /// * any other rejection: `Error` with the message.
    /// * transport, session or decoding failures: unchanged, retry allowed.
    pub fn apply_submission(
        draft: &mut TransactionDraft,
        outcome: Result<RemittanceReceipt>,
    ) -> Result<String> {
        match outcome {
            Ok(receipt) => {
                draft.record_success(receipt.transaction_id.clone())?;
                tracing::info!(transaction_id = %receipt.transaction_id, "remittance accepted");
                Ok(receipt.transaction_id)
            }
            Err(e) if e.is_min_amount_rejection() => {
                tracing::info!("remittance below minimum, staying on {}: {e}", draft.step());
                draft.record_min_amount_rejection(e.to_string());
                Err(e)
            }
            Err(RemitError::Rejected { code, message }) => {
                tracing::warn!(?code, "remittance rejected: {message}");
                draft.record_failure(message.clone());
                Err(RemitError::Rejected { code, message })
            }
            Err(e) => {
                tracing::warn!("remittance submission failed, retry possible: {e}");
                Err(e)
            }
        }
    }
}

/// Assembles the backend body from the draft and its current quote.
pub fn build_request(
    draft: &TransactionDraft,
    quote: &CalculationResult,
    user_id: &str,
) -> Result<RemittanceRequest> {
    let (Some(from_code), Some(to_code), Some(receipt_url)) =
        (draft.from_code(), draft.to_code(), draft.receipt_url())
    else {
        return Err(RemitError::ValidationError(
            "corridor and receipt are required before submitting".to_string(),
        ));
    };
    let recipient = draft.recipient();
    Ok(RemittanceRequest {
        user_id: user_id.to_string(),
        amount_sent: quote.amount,
        currency_sent: quote.from_currency.clone(),
        amount_received: quote.received_amount,
        currency_received: quote.received_currency.clone(),
        fee: quote.fee,
        from_country_code: from_code.to_string(),
        to_country_code: to_code.to_string(),
        recipient_name: recipient.name.clone(),
        recipient_bank: recipient.bank.clone(),
        recipient_account: recipient.account_number.clone(),
        recipient_id: recipient.document_id.clone(),
        receipt_url: receipt_url.to_string(),
        idempotency_key: draft.idempotency_key(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::corridor::{ArrivalTime, CorridorRegistry};
    use crate::domain::draft::{Field, Recipient, Step};
    use crate::domain::remittance::RejectionCode;
    use rust_decimal_macros::dec;

    fn draft_ready() -> TransactionDraft {
        let registry = CorridorRegistry::builtin();
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        draft.set_amount_text("100").unwrap();
        draft.advance(&registry).unwrap();
        draft
            .set_recipient(Recipient {
                name: "Ana".into(),
                bank: "Banesco".into(),
                account_number: "0134".into(),
                document_id: "V1".into(),
            })
            .unwrap();
        draft.advance(&registry).unwrap();
        draft.advance(&registry).unwrap();
        draft.record_receipt("r.png", "https://files/r.png".into()).unwrap();
        draft
    }

    fn quote() -> CalculationResult {
        CalculationResult {
            amount: dec!(100),
            fee: dec!(2.5),
            total: dec!(102.5),
            from_currency: "USD".into(),
            received_amount: dec!(3650),
            received_currency: "VES".into(),
            exchange_rate: dec!(36.5),
            exchange_rate_text: "1 USD = 36.50 VES".into(),
            arrival_time: ArrivalTime::Instant,
            degraded: false,
        }
    }

    #[test]
    fn test_guard_blocks_reentry_and_releases() {
        let flag = InFlight::default();
        let guard = flag.try_begin("upload").unwrap();
        assert!(flag.is_active());
        assert!(matches!(flag.try_begin("upload"), Err(RemitError::Busy("upload"))));
        drop(guard);
        assert!(!flag.is_active());
        assert!(flag.try_begin("upload").is_ok());
    }

    #[test]
    fn test_build_request_carries_draft_and_quote() {
        let draft = draft_ready();
        let request = build_request(&draft, &quote(), "user-1").unwrap();
        assert_eq!(request.user_id, "user-1");
        assert_eq!(request.amount_sent, dec!(100));
        assert_eq!(request.amount_received, dec!(3650));
        assert_eq!(request.fee, dec!(2.5));
        assert_eq!(request.recipient_account, "0134");
        assert_eq!(request.receipt_url, "https://files/r.png");
        assert_eq!(request.idempotency_key, draft.idempotency_key());
    }

    #[test]
    fn test_apply_submission_success() {
        let mut draft = draft_ready();
        let id = SubmissionPipeline::apply_submission(
            &mut draft,
            Ok(RemittanceReceipt {
                transaction_id: "TX-9".into(),
            }),
        )
        .unwrap();
        assert_eq!(id, "TX-9");
        assert_eq!(draft.step(), Step::Success);
        assert_eq!(draft.transaction_id(), Some("TX-9"));
    }

    #[test]
    fn test_apply_submission_min_amount_is_recoverable() {
        let mut draft = draft_ready();
        let result = SubmissionPipeline::apply_submission(
            &mut draft,
            Err(RemitError::Rejected {
                code: RejectionCode::classify(None, "El monto mínimo es 50"),
                message: "El monto mínimo es 50".into(),
            }),
        );
        assert!(result.is_err());
        assert_eq!(draft.step(), Step::Upload);
        assert!(draft.submission_error().is_none());
        assert!(draft.field_error(Field::Amount).is_some());
    }

    #[test]
    fn test_apply_submission_other_rejection_is_terminal() {
        let mut draft = draft_ready();
        let _ = SubmissionPipeline::apply_submission(
            &mut draft,
            Err(RemitError::Rejected {
                code: RejectionCode::Other("UNKNOWN".into()),
                message: "cuenta bloqueada".into(),
            }),
        );
        assert_eq!(draft.step(), Step::Error);
        assert_eq!(draft.submission_error(), Some("cuenta bloqueada"));
        assert!(draft.transaction_id().is_none());
    }

    #[test]
    fn test_apply_submission_network_failure_keeps_step() {
        let mut draft = draft_ready();
        let _ = SubmissionPipeline::apply_submission(
            &mut draft,
            Err(RemitError::NetworkError("connection reset".into())),
        );
        assert_eq!(draft.step(), Step::Upload);
        assert!(draft.submission_error().is_none());
    }
}
