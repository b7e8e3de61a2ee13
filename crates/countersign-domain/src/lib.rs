//! Countersign Domain Layer
//!
//! This crate contains the core entities and trait interfaces for the
//! controlled document-review workflow. It defines the review lifecycle,
//! the append-only audit trail, the ephemeral credentials (approval codes
//! and download tokens), and the per-document-type schema model that
//! drives whitelist validation and block composition.
//!
//! ## Key Concepts
//!
//! - **Review**: one document's data and approval lifecycle
//!   (DRAFT → SUBMITTED → DOWNLOADED, never backwards)
//! - **Audit trail**: append-only ordered record of every mutation and
//!   access attempt, embedded in the review
//! - **Approval code**: short, human-relayable, single-use credential
//!   binding a review to a supervisor
//! - **Download token**: opaque, single-use credential authorizing exactly
//!   one artifact retrieval
//! - **Schema**: the per-document-type field whitelist and block slots
//!
//! Infrastructure implementations (storage, validation, composition,
//! credential issuance) live in the other workspace crates and plug in
//! through the traits defined here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod clock;
pub mod credential;
pub mod review;
pub mod schema;
pub mod status;
pub mod supervisor;
pub mod traits;

// Re-exports for convenience
pub use audit::{AuditAction, AuditLogEntry};
pub use credential::{ApprovalCode, DownloadToken};
pub use review::{DataMap, Review, ReviewId, StateError};
pub use schema::{
    AppendMode, BlockDefinition, ContentKind, DocSchema, FieldKind, FieldSpec, ValidationRules,
};
pub use status::ReviewStatus;
pub use supervisor::Supervisor;
