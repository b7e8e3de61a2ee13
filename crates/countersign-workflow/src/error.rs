//! Workflow error taxonomy

use countersign_credentials::CredentialError;
use countersign_gatekeeper::GatekeeperError;
use thiserror::Error;

/// Errors surfaced to the request-handling boundary
///
/// Per-field validation and whitelist outcomes are never errors; they
/// come back as data inside [`crate::UpdateOutcome`]. These variants
/// cover whole-operation failures: lookups, state-machine violations,
/// and credential checks.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Unknown review id
    #[error("Review not found")]
    NotFound,

    /// No schema exists for the requested document type
    #[error("Unknown doc_type: {0}")]
    UnknownDocType(String),

    /// The review's status disallows the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested transition violates the state machine
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The approval code does not exist
    #[error("Invalid approval code")]
    InvalidCode,

    /// The approval code is past its expiry
    #[error("Approval code has expired")]
    CodeExpired,

    /// The approval code was already consumed
    #[error("Approval code has already been used")]
    CodeAlreadyUsed,

    /// The supervisor password did not verify
    #[error("Invalid supervisor password")]
    WrongPassword,

    /// The supervisor id is unknown or inactive
    #[error("Unknown supervisor: {0}")]
    UnknownSupervisor(String),

    /// The download token is invalid, expired, consumed, or bound to a
    /// different review
    #[error("Invalid or expired download token")]
    InvalidToken,

    /// Underlying persistence failure
    #[error("Store error: {0}")]
    Store(String),

    /// Schema loading or parsing failure
    #[error("Schema error: {0}")]
    Schema(String),

    /// The external renderer failed; the download token was restored
    #[error("Render error: {0}")]
    Render(String),
}

impl From<GatekeeperError> for WorkflowError {
    fn from(e: GatekeeperError) -> Self {
        match e {
            GatekeeperError::UnknownDocType(doc_type) => WorkflowError::UnknownDocType(doc_type),
            other => WorkflowError::Schema(other.to_string()),
        }
    }
}

impl From<CredentialError> for WorkflowError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::NotFound => WorkflowError::InvalidCode,
            CredentialError::AlreadyUsed => WorkflowError::CodeAlreadyUsed,
            CredentialError::Expired => WorkflowError::CodeExpired,
            CredentialError::UnknownSupervisor(id) => WorkflowError::UnknownSupervisor(id),
            CredentialError::Store(msg) | CredentialError::Config(msg) => {
                WorkflowError::Store(msg)
            }
        }
    }
}
