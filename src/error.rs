use crate::domain::draft::Step;
use crate::domain::remittance::RejectionCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemitError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("no active session")]
    NoSession,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("{message}")]
    Rejected { code: RejectionCode, message: String },
    #[error("cannot {action} while the draft is in the {step} step")]
    InvalidTransition { step: Step, action: &'static str },
    #[error("{0} already in progress")]
    Busy(&'static str),
    #[error("draft was reset or closed before the {0} completed")]
    Stale(&'static str),
    #[error("cannot {0}: the flow is closed")]
    Closed(&'static str),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification used by callers to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Blocked locally; never reached the network.
    Validation,
    /// The user must sign in again.
    Session,
    /// Transport failure; cached data or a retry is the answer.
    Network,
    /// The backend refused the request.
    BackendRejection,
    Internal,
}

impl RemitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemitError::ValidationError(_)
            | RemitError::InvalidTransition { .. }
            | RemitError::Busy(_) => ErrorKind::Validation,
            RemitError::NoSession => ErrorKind::Session,
            RemitError::NetworkError(_) => ErrorKind::Network,
            RemitError::Rejected { .. } => ErrorKind::BackendRejection,
            RemitError::CsvError(_)
            | RemitError::IoError(_)
            | RemitError::ConfigError(_)
            | RemitError::Stale(_)
            | RemitError::Closed(_)
            | RemitError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Rejections the user can fix without starting over.
    pub fn is_min_amount_rejection(&self) -> bool {
        matches!(
            self,
            RemitError::Rejected {
                code: RejectionCode::MinAmount,
                ..
            }
        )
    }
}

impl From<reqwest::Error> for RemitError {
    fn from(err: reqwest::Error) -> Self {
        RemitError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for RemitError {
    fn from(err: serde_json::Error) -> Self {
        RemitError::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for RemitError {
    fn from(err: rocksdb::Error) -> Self {
        RemitError::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RemitError>;
