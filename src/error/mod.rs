//! Error handling for the LeaveChain coordinator

use thiserror::Error;

use crate::chain::AddressParseError;

/// Main error type for the coordinator and its collaborators
#[derive(Error, Debug)]
pub enum LeaveChainError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("A transaction is already in flight")]
    AlreadyInFlight,

    #[error("Submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    #[error("Confirmation failed: {reason}")]
    ConfirmationFailed { reason: String },

    #[error("Contract read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the LeaveChain coordinator
pub type Result<T> = std::result::Result<T, LeaveChainError>;

impl From<AddressParseError> for LeaveChainError {
    fn from(err: AddressParseError) -> Self {
        LeaveChainError::InvalidInput {
            reason: err.to_string(),
        }
    }
}
