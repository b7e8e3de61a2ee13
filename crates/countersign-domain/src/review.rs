//! Review entity - the unit of work tracking one document's lifecycle

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::audit::{AuditAction, AuditLogEntry};
use crate::clock::epoch_secs;
use crate::status::ReviewStatus;

/// The review's mutable data map: field name → scalar, list, or nested object
pub type DataMap = serde_json::Map<String, Value>;

/// Unique identifier for a review
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ReviewId(uuid::Uuid);

impl ReviewId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse a ReviewId from its string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid review id: {}", e))
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure signal from a state-machine operation
///
/// These are expected outcomes, not faults: callers check the review's
/// status semantics and translate them at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// The review is no longer in DRAFT and its data map is frozen
    #[error("review is not editable in its current status")]
    NotEditable,

    /// The requested transition violates DRAFT → SUBMITTED → DOWNLOADED
    #[error("transition conflicts with the review's current status")]
    Conflict,
}

/// The central entity: one document's data and approval lifecycle
///
/// Invariants:
/// - the data map is only mutated while status = DRAFT
/// - status transitions are monotonic and never reverse
/// - every mutation of status or data appends exactly one audit entry
///
/// The audit trail is embedded and exclusively owned by the review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique identifier
    pub id: ReviewId,

    /// Document-type tag; selects the schema and template
    pub doc_type: String,

    /// Lifecycle status
    pub status: ReviewStatus,

    /// Field name → value map rendered into the final artifact
    pub data: DataMap,

    /// Identity of the author who created the review
    pub created_by: String,

    /// Creation time (seconds since Unix epoch)
    pub created_at: u64,

    /// Append-only audit trail, in insertion order
    pub audit_log: Vec<AuditLogEntry>,

    /// When the review was frozen, once submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<u64>,

    /// When the artifact was retrieved, once downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<u64>,

    /// Who retrieved the artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_by: Option<String>,
}

impl Review {
    /// Create a new review in DRAFT status with a "create" audit entry
    ///
    /// The caller is responsible for checking that a schema exists for
    /// `doc_type` before construction.
    pub fn create(doc_type: impl Into<String>, initial_data: DataMap, created_by: impl Into<String>) -> Self {
        let doc_type = doc_type.into();
        let created_by = created_by.into();

        let mut review = Self {
            id: ReviewId::new(),
            doc_type: doc_type.clone(),
            status: ReviewStatus::Draft,
            data: initial_data,
            created_by: created_by.clone(),
            created_at: epoch_secs(),
            audit_log: Vec::new(),
            submitted_at: None,
            downloaded_at: None,
            downloaded_by: None,
        };

        review.append_audit(
            AuditLogEntry::new(AuditAction::Create, created_by)
                .with_details(format!("Review created for doc_type={}", doc_type)),
        );

        review
    }

    /// Whether the data map may still be mutated
    pub fn can_edit(&self) -> bool {
        self.status == ReviewStatus::Draft
    }

    /// Whether the review may be submitted
    pub fn can_submit(&self) -> bool {
        self.status == ReviewStatus::Draft
    }

    /// Whether the artifact may be downloaded
    pub fn can_download(&self) -> bool {
        self.status == ReviewStatus::Submitted
    }

    /// Update a single field, recording the old/new pair in the audit trail
    ///
    /// The whitelist gate is applied by the caller before this is invoked;
    /// this method only enforces the status invariant.
    pub fn update_field(
        &mut self,
        field_name: &str,
        new_value: Value,
        actor: &str,
        origin: Option<&str>,
    ) -> Result<(), StateError> {
        if !self.can_edit() {
            return Err(StateError::NotEditable);
        }

        let old_value = self.data.get(field_name).cloned();
        self.data.insert(field_name.to_string(), new_value.clone());

        let mut entry = AuditLogEntry::new(AuditAction::FieldUpdate, actor)
            .with_field(field_name)
            .with_values(old_value, Some(new_value));
        if let Some(origin) = origin {
            entry = entry.with_origin(origin);
        }
        self.append_audit(entry);

        Ok(())
    }

    /// Record an attempted update to a non-editable field
    ///
    /// Always succeeds and never mutates the data map.
    pub fn log_unauthorized_attempt(
        &mut self,
        field_name: &str,
        attempted_value: Option<Value>,
        actor: &str,
        origin: Option<&str>,
    ) {
        let mut entry = AuditLogEntry::new(AuditAction::UnauthorizedFieldAttempt, actor)
            .with_field(field_name)
            .with_values(None, attempted_value)
            .with_details("Attempted to update non-editable field");
        if let Some(origin) = origin {
            entry = entry.with_origin(origin);
        }
        self.append_audit(entry);
    }

    /// Freeze the review for supervisor approval
    ///
    /// Idempotent submission is disallowed: submitting anything but a DRAFT
    /// review is a conflict.
    pub fn submit(&mut self, actor: &str, origin: Option<&str>) -> Result<(), StateError> {
        if !self.can_submit() {
            return Err(StateError::Conflict);
        }

        let now = epoch_secs();
        self.status = ReviewStatus::Submitted;
        self.submitted_at = Some(now);

        let mut entry = AuditLogEntry::new(AuditAction::Submit, actor)
            .with_details("Review submitted and frozen");
        entry.timestamp = now;
        if let Some(origin) = origin {
            entry = entry.with_origin(origin);
        }
        self.append_audit(entry);

        Ok(())
    }

    /// Finalize the review after a successful artifact retrieval
    pub fn mark_downloaded(
        &mut self,
        actor: &str,
        origin: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), StateError> {
        if !self.can_download() {
            return Err(StateError::Conflict);
        }

        let now = epoch_secs();
        self.status = ReviewStatus::Downloaded;
        self.downloaded_at = Some(now);
        self.downloaded_by = Some(actor.to_string());

        let mut entry = AuditLogEntry::new(AuditAction::Download, actor)
            .with_details("Document downloaded");
        entry.timestamp = now;
        if let Some(origin) = origin {
            entry = entry.with_origin(origin);
        }
        if let Some(user_agent) = user_agent {
            entry = entry.with_user_agent(user_agent);
        }
        self.append_audit(entry);

        Ok(())
    }

    /// Append an entry to the audit trail
    pub fn append_audit(&mut self, entry: AuditLogEntry) {
        self.audit_log.push(entry);
    }

    /// Return only the entries of `data` whose key is in `editable_fields`
    pub fn editable_data(&self, editable_fields: &[String]) -> DataMap {
        self.data
            .iter()
            .filter(|(k, _)| editable_fields.iter().any(|f| f == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The supervisor's entry link for this review
    pub fn manager_link(&self, base_url: &str) -> String {
        format!("{}/manager/reviews/{}", base_url.trim_end_matches('/'), self.id)
    }
}
