use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credential of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
}

/// Payment proof picked by the user, held in memory until uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ReceiptFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guesses the content type from the extension; receipts are images or PDFs.
    pub fn content_type_for(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

/// Body of `POST /remittances/send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemittanceRequest {
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_sent: Decimal,
    pub currency_sent: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_received: Decimal,
    pub currency_received: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
    pub from_country_code: String,
    pub to_country_code: String,
    pub recipient_name: String,
    pub recipient_bank: String,
    pub recipient_account: String,
    pub recipient_id: String,
    pub receipt_url: String,
    pub idempotency_key: Uuid,
}

/// Successful backend response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemittanceReceipt {
    pub transaction_id: String,
}

/// Reason the backend gave for refusing a remittance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionCode {
    /// The amount is under the corridor minimum; the user can fix it in place.
    MinAmount,
    Other(String),
}

pub const MIN_AMOUNT_CODE: &str = "MIN_AMOUNT";
const MIN_AMOUNT_MARKERS: [&str; 3] = ["mínimo", "minimo", "minimum"];

impl RejectionCode {
    /// Prefers the structured code; falls back to matching the message text
    /// for backends that only send a message.
    pub fn classify(code: Option<&str>, message: &str) -> Self {
        match code {
            Some(MIN_AMOUNT_CODE) => RejectionCode::MinAmount,
            Some(other) => RejectionCode::Other(other.to_string()),
            None => {
                let lowered = message.to_lowercase();
                if MIN_AMOUNT_MARKERS.iter().any(|m| lowered.contains(m)) {
                    RejectionCode::MinAmount
                } else {
                    RejectionCode::Other("UNKNOWN".to_string())
                }
            }
        }
    }
}
