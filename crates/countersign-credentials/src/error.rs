//! Credential error types

use thiserror::Error;

/// Errors that can occur during credential operations
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The code or token does not exist
    #[error("Credential not found")]
    NotFound,

    /// The code has already been consumed
    #[error("Credential has already been used")]
    AlreadyUsed,

    /// The code is past its expiry time
    #[error("Credential has expired")]
    Expired,

    /// The supervisor id is unknown or inactive
    #[error("Unknown supervisor: {0}")]
    UnknownSupervisor(String),

    /// Underlying store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration failure (supervisor directory)
    #[error("Configuration error: {0}")]
    Config(String),
}
