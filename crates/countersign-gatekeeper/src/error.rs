//! Gatekeeper error types

use thiserror::Error;

/// Errors that can occur during gatekeeper operations
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// No schema exists for the requested document type
    #[error("Unknown doc_type: {0}")]
    UnknownDocType(String),

    /// A schema file exists but cannot be parsed
    #[error("Schema error: {0}")]
    Schema(String),

    /// I/O error while reading a schema file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
