use super::amount::{format_money, parse_amount_text};
use super::beneficiary::Beneficiary;
use super::corridor::CorridorRegistry;
use crate::error::{RemitError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// The screen of the send flow the draft is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Amount,
    Recipient,
    /// Instructions on where to pay; nothing to validate.
    Payment,
    Upload,
    Success,
    Error,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Success | Step::Error)
    }

    fn previous(&self) -> Option<Step> {
        match self {
            Step::Recipient => Some(Step::Amount),
            Step::Payment => Some(Step::Recipient),
            Step::Upload => Some(Step::Payment),
            Step::Amount | Step::Success | Step::Error => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Amount => "amount",
            Step::Recipient => "recipient",
            Step::Payment => "payment",
            Step::Upload => "upload",
            Step::Success => "success",
            Step::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Corridor,
    Amount,
    RecipientName,
    RecipientAccount,
    RecipientDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Required,
    NotPositive,
    BelowMinimum { minimum: Decimal, currency: String },
    UnknownCorridor(String),
    /// Minimum-amount refusal reported by the backend, kept verbatim.
    Rejected(String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Required => f.write_str("required"),
            FieldError::NotPositive => f.write_str("amount must be greater than zero"),
            FieldError::BelowMinimum { minimum, currency } => write!(
                f,
                "amount below minimum ({} {currency})",
                format_money(*minimum)
            ),
            FieldError::UnknownCorridor(code) => write!(f, "unknown country {code}"),
            FieldError::Rejected(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    /// Shown on the summary; not validated by the flow.
    pub bank: String,
    pub account_number: String,
    pub document_id: String,
}

/// The in-progress transaction for one user session.
///
/// Fields are only reachable through methods so that the step ordering and
/// the receipt/transaction invariants cannot be bypassed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    idempotency_key: Uuid,
    amount_text: String,
    from_code: Option<String>,
    to_code: Option<String>,
    recipient: Recipient,
    save_as_beneficiary: bool,
    receipt_file_ref: Option<String>,
    receipt_url: Option<String>,
    transaction_id: Option<String>,
    step: Step,
    field_errors: BTreeMap<Field, FieldError>,
    submission_error: Option<String>,
}

impl Default for TransactionDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self {
            idempotency_key: Uuid::new_v4(),
            amount_text: String::new(),
            from_code: None,
            to_code: None,
            recipient: Recipient::default(),
            save_as_beneficiary: false,
            receipt_file_ref: None,
            receipt_url: None,
            transaction_id: None,
            step: Step::Amount,
            field_errors: BTreeMap::new(),
            submission_error: None,
        }
    }

    pub fn with_corridor(from_code: &str, to_code: &str) -> Self {
        let mut draft = Self::new();
        draft.from_code = Some(from_code.to_string());
        draft.to_code = Some(to_code.to_string());
        draft
    }

    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    pub fn amount_text(&self) -> &str {
        &self.amount_text
    }

    /// Parsed amount, ignoring thousand separators.
    pub fn amount(&self) -> Option<Decimal> {
        parse_amount_text(&self.amount_text)
    }

    pub fn from_code(&self) -> Option<&str> {
        self.from_code.as_deref()
    }

    pub fn to_code(&self) -> Option<&str> {
        self.to_code.as_deref()
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn save_as_beneficiary(&self) -> bool {
        self.save_as_beneficiary
    }

    pub fn receipt_file_ref(&self) -> Option<&str> {
        self.receipt_file_ref.as_deref()
    }

    pub fn receipt_url(&self) -> Option<&str> {
        self.receipt_url.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn field_errors(&self) -> &BTreeMap<Field, FieldError> {
        &self.field_errors
    }

    pub fn field_error(&self, field: Field) -> Option<&FieldError> {
        self.field_errors.get(&field)
    }

    pub fn submission_error(&self) -> Option<&str> {
        self.submission_error.as_deref()
    }

    /// Upload finished; the confirmation summary can be shown and submitted.
    pub fn is_ready_to_submit(&self) -> bool {
        self.step == Step::Upload && self.receipt_url.is_some()
    }

    pub fn set_amount_text(&mut self, text: &str) -> Result<()> {
        self.ensure_editable("edit the amount")?;
        self.amount_text = text.to_string();
        self.field_errors.remove(&Field::Amount);
        Ok(())
    }

    pub fn set_corridor(&mut self, from_code: &str, to_code: &str) -> Result<()> {
        self.ensure_editable("change the corridor")?;
        self.from_code = Some(from_code.to_string());
        self.to_code = Some(to_code.to_string());
        self.field_errors.remove(&Field::Corridor);
        Ok(())
    }

    /// Exchanges origin and destination. Amounts are corridor specific, so
    /// the typed amount is cleared.
    pub fn swap_corridor(&mut self) -> Result<()> {
        self.ensure_editable("swap the corridor")?;
        std::mem::swap(&mut self.from_code, &mut self.to_code);
        self.amount_text.clear();
        self.field_errors.remove(&Field::Amount);
        Ok(())
    }

    pub fn set_recipient(&mut self, recipient: Recipient) -> Result<()> {
        self.ensure_editable("edit the recipient")?;
        self.recipient = recipient;
        self.field_errors.remove(&Field::RecipientName);
        self.field_errors.remove(&Field::RecipientAccount);
        self.field_errors.remove(&Field::RecipientDocument);
        Ok(())
    }

    pub fn set_save_as_beneficiary(&mut self, save: bool) -> Result<()> {
        self.ensure_editable("change the beneficiary option")?;
        self.save_as_beneficiary = save;
        Ok(())
    }

    /// Moves one step forward if the current step's gate passes.
    ///
    /// On a failed gate the step is unchanged, the offending fields carry an
    /// error, and a `ValidationError` summarising them is returned.
    pub fn advance(&mut self, registry: &CorridorRegistry) -> Result<Step> {
        let next = match self.step {
            Step::Amount => {
                self.validate_amount(registry)?;
                Step::Recipient
            }
            Step::Recipient => {
                self.validate_recipient()?;
                Step::Payment
            }
            Step::Payment => Step::Upload,
            step => {
                return Err(RemitError::InvalidTransition {
                    step,
                    action: "advance",
                });
            }
        };
        self.step = next;
        Ok(next)
    }

    /// Re-runs the amount gate (corridor known, amount at or above the
    /// origin minimum) without moving the step. The amount stays editable
    /// after the first gate, so submission checks it again.
    pub fn check_amount(&mut self, registry: &CorridorRegistry) -> Result<()> {
        self.validate_amount(registry)
    }

    pub fn back(&mut self) -> Result<Step> {
        let previous = self.step.previous().ok_or(RemitError::InvalidTransition {
            step: self.step,
            action: "go back",
        })?;
        self.step = previous;
        Ok(previous)
    }

    /// Loads a saved beneficiary, returning to the amount step from wherever
    /// the draft is. A finished draft is replaced by a fresh one first.
    ///
    /// Pre-filling starts a new transfer: the idempotency key is renewed and
    /// any uploaded receipt is dropped.
    pub fn prefill(&mut self, beneficiary: &Beneficiary) {
        if self.step.is_terminal() {
            let (from, to) = (self.from_code.take(), self.to_code.take());
            *self = Self::new();
            self.from_code = from;
            self.to_code = to;
        }
        self.idempotency_key = Uuid::new_v4();
        self.receipt_file_ref = None;
        self.receipt_url = None;
        self.recipient = beneficiary.recipient();
        if let Some(country) = &beneficiary.country_code {
            self.to_code = Some(country.clone());
        }
        self.amount_text.clear();
        self.field_errors.clear();
        self.submission_error = None;
        self.step = Step::Amount;
    }

    pub(crate) fn record_receipt(&mut self, file_name: &str, url: String) -> Result<()> {
        if self.step != Step::Upload {
            return Err(RemitError::InvalidTransition {
                step: self.step,
                action: "attach a receipt",
            });
        }
        self.receipt_file_ref = Some(file_name.to_string());
        self.receipt_url = Some(url);
        Ok(())
    }

    pub(crate) fn record_success(&mut self, transaction_id: String) -> Result<()> {
        if !self.is_ready_to_submit() {
            return Err(RemitError::InvalidTransition {
                step: self.step,
                action: "complete the transfer",
            });
        }
        self.transaction_id = Some(transaction_id);
        self.submission_error = None;
        self.step = Step::Success;
        Ok(())
    }

    /// Keeps the step so the user can adjust the amount and resubmit.
    pub(crate) fn record_min_amount_rejection(&mut self, message: String) {
        self.field_errors
            .insert(Field::Amount, FieldError::Rejected(message));
    }

    pub(crate) fn record_failure(&mut self, message: String) {
        self.submission_error = Some(message);
        self.step = Step::Error;
    }

    fn ensure_editable(&self, action: &'static str) -> Result<()> {
        if self.step.is_terminal() {
            return Err(RemitError::InvalidTransition {
                step: self.step,
                action,
            });
        }
        Ok(())
    }

    fn validate_amount(&mut self, registry: &CorridorRegistry) -> Result<()> {
        let (Some(from_code), Some(to_code)) = (self.from_code.clone(), self.to_code.clone())
        else {
            return self.reject(Field::Corridor, FieldError::Required);
        };
        if registry.get(&to_code).is_none() {
            return self.reject(Field::Corridor, FieldError::UnknownCorridor(to_code));
        }
        let Some(origin) = registry.get(&from_code) else {
            return self.reject(Field::Corridor, FieldError::UnknownCorridor(from_code));
        };

        let error = match self.amount() {
            Some(amount) if amount <= Decimal::ZERO => Some(FieldError::NotPositive),
            None => Some(FieldError::NotPositive),
            Some(amount) if amount < origin.minimum_send_amount => {
                Some(FieldError::BelowMinimum {
                    minimum: origin.minimum_send_amount,
                    currency: origin.currency.clone(),
                })
            }
            Some(_) => None,
        };
        match error {
            Some(error) => self.reject(Field::Amount, error),
            None => {
                self.field_errors.remove(&Field::Amount);
                self.field_errors.remove(&Field::Corridor);
                Ok(())
            }
        }
    }

    fn validate_recipient(&mut self) -> Result<()> {
        let required = [
            (Field::RecipientName, self.recipient.name.trim().is_empty()),
            (
                Field::RecipientAccount,
                self.recipient.account_number.trim().is_empty(),
            ),
            (
                Field::RecipientDocument,
                self.recipient.document_id.trim().is_empty(),
            ),
        ];
        let mut missing = Vec::new();
        for (field, is_empty) in required {
            if is_empty {
                self.field_errors.insert(field, FieldError::Required);
                missing.push(format!("{field:?}"));
            } else {
                self.field_errors.remove(&field);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RemitError::ValidationError(format!(
                "missing recipient fields: {}",
                missing.join(", ")
            )))
        }
    }

    fn reject(&mut self, field: Field, error: FieldError) -> Result<()> {
        let message = error.to_string();
        self.field_errors.insert(field, error);
        Err(RemitError::ValidationError(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn registry() -> CorridorRegistry {
        CorridorRegistry::builtin()
    }

    fn recipient() -> Recipient {
        Recipient {
            name: "Ana Pérez".into(),
            bank: "Banesco".into(),
            account_number: "01340000000000000000".into(),
            document_id: "V12345678".into(),
        }
    }

    fn draft_at_payment() -> TransactionDraft {
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        draft.set_amount_text("100").unwrap();
        draft.advance(&registry()).unwrap();
        draft.set_recipient(recipient()).unwrap();
        draft.advance(&registry()).unwrap();
        draft
    }

    #[test]
    fn test_amount_below_minimum_blocks() {
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        draft.set_amount_text("5").unwrap();

        let result = draft.advance(&registry());

        assert!(matches!(result, Err(RemitError::ValidationError(_))));
        assert_eq!(draft.step(), Step::Amount);
        let error = draft.field_error(Field::Amount).unwrap();
        assert!(error.to_string().starts_with("amount below minimum"));
        assert_eq!(
            *error,
            FieldError::BelowMinimum {
                minimum: dec!(20),
                currency: "USD".into()
            }
        );
    }

    #[test]
    fn test_zero_and_garbage_amount_block() {
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        for text in ["0", "", "abc", "-3"] {
            draft.set_amount_text(text).unwrap();
            assert!(draft.advance(&registry()).is_err());
            assert_eq!(draft.step(), Step::Amount);
            assert_eq!(
                draft.field_error(Field::Amount),
                Some(&FieldError::NotPositive)
            );
        }
    }

    #[test]
    fn test_missing_corridor_blocks() {
        let mut draft = TransactionDraft::new();
        draft.set_amount_text("100").unwrap();
        assert!(draft.advance(&registry()).is_err());
        assert_eq!(draft.field_error(Field::Corridor), Some(&FieldError::Required));

        draft.set_corridor("US", "ZZ").unwrap();
        assert!(draft.advance(&registry()).is_err());
        assert_eq!(
            draft.field_error(Field::Corridor),
            Some(&FieldError::UnknownCorridor("ZZ".into()))
        );
    }

    #[test]
    fn test_amount_with_separators_passes() {
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        draft.set_amount_text("1,000").unwrap();
        assert_eq!(draft.advance(&registry()).unwrap(), Step::Recipient);
        assert!(draft.field_errors().is_empty());
    }

    #[test]
    fn test_recipient_fields_each_reported() {
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        draft.set_amount_text("100").unwrap();
        draft.advance(&registry()).unwrap();
        draft
            .set_recipient(Recipient {
                name: "  ".into(),
                bank: String::new(),
                account_number: String::new(),
                document_id: "V1".into(),
            })
            .unwrap();

        assert!(draft.advance(&registry()).is_err());
        assert_eq!(draft.step(), Step::Recipient);
        assert!(draft.field_error(Field::RecipientName).is_some());
        assert!(draft.field_error(Field::RecipientAccount).is_some());
        assert!(draft.field_error(Field::RecipientDocument).is_none());
    }

    #[test]
    fn test_bank_is_not_required() {
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        draft.set_amount_text("100").unwrap();
        draft.advance(&registry()).unwrap();
        draft
            .set_recipient(Recipient {
                bank: String::new(),
                ..recipient()
            })
            .unwrap();
        assert_eq!(draft.advance(&registry()).unwrap(), Step::Payment);
    }

    #[test]
    fn test_payment_to_upload_is_unconditional() {
        let mut draft = draft_at_payment();
        assert_eq!(draft.advance(&registry()).unwrap(), Step::Upload);
        assert!(matches!(
            draft.advance(&registry()),
            Err(RemitError::InvalidTransition {
                step: Step::Upload,
                ..
            })
        ));
    }

    #[test]
    fn test_back_navigation() {
        let mut draft = draft_at_payment();
        assert_eq!(draft.back().unwrap(), Step::Recipient);
        assert_eq!(draft.back().unwrap(), Step::Amount);
        assert!(draft.back().is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut draft = draft_at_payment();
        draft.advance(&registry()).unwrap();
        draft.record_failure("rejected".into());

        assert_eq!(draft.step(), Step::Error);
        assert!(draft.back().is_err());
        assert!(draft.advance(&registry()).is_err());
        assert!(draft.set_amount_text("50").is_err());
    }

    #[test]
    fn test_prefill_mid_flow_resets() {
        let mut draft = draft_at_payment();
        draft.field_errors.insert(Field::Amount, FieldError::NotPositive);
        draft.submission_error = Some("old".into());
        let beneficiary = Beneficiary {
            id: "b1".into(),
            name: "Luis".into(),
            bank: "Mercantil".into(),
            account_number: "0105".into(),
            document_id: "V9".into(),
            country_code: None,
        };

        draft.advance(&registry()).unwrap();
        draft.record_receipt("r.png", "https://r".into()).unwrap();
        let key = draft.idempotency_key();

        draft.prefill(&beneficiary);

        assert_eq!(draft.step(), Step::Amount);
        assert_ne!(draft.idempotency_key(), key);
        assert!(draft.receipt_url().is_none());
        assert!(draft.receipt_file_ref().is_none());
        assert!(!draft.is_ready_to_submit());
        assert_eq!(draft.recipient().name, "Luis");
        assert_eq!(draft.recipient().account_number, "0105");
        assert_eq!(draft.amount_text(), "");
        assert!(draft.field_errors().is_empty());
        assert!(draft.submission_error().is_none());
        assert_eq!(draft.to_code(), Some("VE"));
    }

    #[test]
    fn test_prefill_from_terminal_starts_fresh() {
        let mut draft = draft_at_payment();
        draft.advance(&registry()).unwrap();
        draft.record_receipt("r.png", "https://r".into()).unwrap();
        draft.record_success("TX1".into()).unwrap();
        let key = draft.idempotency_key();

        let beneficiary = Beneficiary::from_recipient(&recipient(), Some("CO".into()));
        draft.prefill(&beneficiary);

        assert_eq!(draft.step(), Step::Amount);
        assert!(draft.transaction_id().is_none());
        assert!(draft.receipt_url().is_none());
        assert_ne!(draft.idempotency_key(), key);
        assert_eq!(draft.from_code(), Some("US"));
        assert_eq!(draft.to_code(), Some("CO"));
    }

    #[test]
    fn test_check_amount_after_edit_at_upload() {
        let mut draft = draft_at_payment();
        draft.advance(&registry()).unwrap();
        draft.set_amount_text("5").unwrap();

        assert!(matches!(
            draft.check_amount(&registry()),
            Err(RemitError::ValidationError(_))
        ));
        assert_eq!(draft.step(), Step::Upload);
        assert!(matches!(
            draft.field_error(Field::Amount),
            Some(FieldError::BelowMinimum { .. })
        ));

        draft.set_amount_text("25").unwrap();
        assert!(draft.check_amount(&registry()).is_ok());
        assert!(draft.field_error(Field::Amount).is_none());
    }

    #[test]
    fn test_swap_clears_amount() {
        let mut draft = TransactionDraft::with_corridor("US", "VE");
        draft.set_amount_text("100").unwrap();
        draft.swap_corridor().unwrap();
        assert_eq!(draft.from_code(), Some("VE"));
        assert_eq!(draft.to_code(), Some("US"));
        assert_eq!(draft.amount_text(), "");
    }

    #[test]
    fn test_receipt_only_in_upload_step() {
        let mut draft = draft_at_payment();
        assert!(draft.record_receipt("r.png", "https://r".into()).is_err());
        assert!(draft.receipt_url().is_none());

        draft.advance(&registry()).unwrap();
        draft.record_receipt("r.png", "https://r".into()).unwrap();
        assert!(draft.is_ready_to_submit());
        assert_eq!(draft.receipt_file_ref(), Some("r.png"));
    }

    #[test]
    fn test_success_requires_receipt() {
        let mut draft = draft_at_payment();
        draft.advance(&registry()).unwrap();
        assert!(draft.record_success("TX1".into()).is_err());
        assert!(draft.transaction_id().is_none());
    }

    #[test]
    fn test_min_amount_rejection_keeps_step() {
        let mut draft = draft_at_payment();
        draft.advance(&registry()).unwrap();
        draft.record_min_amount_rejection("monto mínimo 20".into());
        assert_eq!(draft.step(), Step::Upload);
        assert_eq!(
            draft.field_error(Field::Amount).unwrap().to_string(),
            "monto mínimo 20"
        );
    }
}
