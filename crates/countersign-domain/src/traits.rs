//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the workflow's domain logic
//! and infrastructure. Implementations live in other crates: persistence
//! in countersign-store, rendering in the deployment's renderer.

use std::path::PathBuf;

use crate::credential::{ApprovalCode, DownloadToken};
use crate::review::{DataMap, Review, ReviewId};
use crate::status::ReviewStatus;

/// Trait for durable review persistence
///
/// Implemented by the infrastructure layer (countersign-store)
pub trait ReviewStore {
    /// Error type for store operations
    type Error;

    /// Persist a full review snapshot, replacing any previous one
    fn save_review(&self, review: &Review) -> Result<(), Self::Error>;

    /// Load a review by id
    fn load_review(&self, id: ReviewId) -> Result<Option<Review>, Self::Error>;

    /// Whether a review exists
    fn review_exists(&self, id: ReviewId) -> Result<bool, Self::Error>;

    /// List reviews matching the filter, newest first by creation time
    fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>, Self::Error>;
}

/// Filter criteria for listing reviews
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    /// Restrict to a lifecycle status
    pub status: Option<ReviewStatus>,

    /// Restrict to a creator identity
    pub created_by: Option<String>,
}

/// Trait for durable storage of approval codes and download tokens
///
/// The consume/mark-used operations are atomic check-and-set: they
/// succeed at most once per credential, which is what gives the two
/// artifacts their single-use semantics under concurrency.
pub trait CredentialStore {
    /// Error type for store operations
    type Error;

    /// Persist a new approval code
    fn put_code(&self, code: &ApprovalCode) -> Result<(), Self::Error>;

    /// Look up an approval code by its (normalized) code string
    fn get_code(&self, code: &str) -> Result<Option<ApprovalCode>, Self::Error>;

    /// Whether a code string is already taken
    fn code_exists(&self, code: &str) -> Result<bool, Self::Error>;

    /// Atomically mark a code used; returns false if absent or already used
    fn mark_code_used(&self, code: &str, used_at: u64) -> Result<bool, Self::Error>;

    /// All codes issued for a review, newest first
    fn codes_for_review(&self, review_id: ReviewId) -> Result<Vec<ApprovalCode>, Self::Error>;

    /// Drop expired, never-used codes; returns how many were removed
    fn purge_expired_codes(&self, now: u64) -> Result<usize, Self::Error>;

    /// Persist a new download token
    fn put_token(&self, token: &DownloadToken) -> Result<(), Self::Error>;

    /// Look up a token without consuming it
    fn get_token(&self, token: &str) -> Result<Option<DownloadToken>, Self::Error>;

    /// Atomically consume a token if it is bound to `review_id`, unused,
    /// and unexpired as of `now`; returns whether it was consumed
    fn consume_token(&self, token: &str, review_id: ReviewId, now: u64)
        -> Result<bool, Self::Error>;

    /// Return a consumed token to the unused state
    ///
    /// Only invoked when the renderer fails after token validation, so
    /// the supervisor can retry with the same token.
    fn restore_token(&self, token: &str) -> Result<(), Self::Error>;

    /// Drop expired, never-used tokens; returns how many were removed
    fn purge_expired_tokens(&self, now: u64) -> Result<usize, Self::Error>;
}

/// The rendered artifact handed back by the external renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Where the artifact was written
    pub path: PathBuf,

    /// Download filename to present to the client
    pub filename: String,
}

/// Trait for the external template renderer
///
/// Consumed as a black box: it receives the finalized data map with the
/// `__block_*__` variables already injected and produces the artifact.
pub trait Renderer {
    /// Error type for render operations
    type Error;

    /// Render the document for a review
    fn render(
        &self,
        doc_type: &str,
        data: &DataMap,
        review_id: ReviewId,
    ) -> Result<RenderedArtifact, Self::Error>;
}
