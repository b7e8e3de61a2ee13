//! Supervisor identity record

use serde::{Deserialize, Serialize};

/// A supervisor who may authorize downloads
///
/// Read-only at runtime and managed by external configuration; the
/// verifiable secret lives in the credential layer's directory, never in
/// this display-safe record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supervisor {
    /// Stable identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Contact email
    pub email: String,

    /// Inactive supervisors cannot receive approval codes
    pub active: bool,
}
