use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::draft::Recipient;

/// A recipient the user chose to keep for future transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: String,
    pub name: String,
    pub bank: String,
    pub account_number: String,
    pub document_id: String,
    /// Destination country of the transfer the beneficiary was saved from.
    pub country_code: Option<String>,
}

impl Beneficiary {
    pub fn from_recipient(recipient: &Recipient, country_code: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: recipient.name.clone(),
            bank: recipient.bank.clone(),
            account_number: recipient.account_number.clone(),
            document_id: recipient.document_id.clone(),
            country_code,
        }
    }

    pub fn recipient(&self) -> Recipient {
        Recipient {
            name: self.name.clone(),
            bank: self.bank.clone(),
            account_number: self.account_number.clone(),
            document_id: self.document_id.clone(),
        }
    }
}
