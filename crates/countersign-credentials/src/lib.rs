//! Countersign Credentials
//!
//! Issues and validates the two ephemeral security artifacts of the
//! workflow, plus the supervisor directory they are checked against:
//!
//! - **Approval codes**: short, human-relayable, supervisor-bound,
//!   review-bound, single-use, time-limited
//! - **Download tokens**: opaque, review-bound, single-use, short-lived
//! - **Supervisor directory**: read-only identity records with a
//!   verifiable secret, loaded from TOML configuration at startup
//!
//! Single-use enforcement lives in the credential store's atomic
//! check-and-mark operations; the services here add generation,
//! normalization, expiry policy, and reporting.

#![warn(missing_docs)]

mod approval;
mod error;
mod supervisor;
mod token;

pub use approval::{ApprovalCodeInfo, ApprovalCodeService, DEFAULT_CODE_TTL_HOURS};
pub use error::CredentialError;
pub use supervisor::SupervisorDirectory;
pub use token::{DownloadTokenService, DEFAULT_TOKEN_TTL_SECS};
