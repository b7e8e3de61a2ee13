//! Append-only audit trail

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::epoch_secs;

/// Kind of action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Review created
    Create,

    /// A whitelisted field was updated
    FieldUpdate,

    /// An update to a non-editable field was rejected
    UnauthorizedFieldAttempt,

    /// Review submitted and frozen
    Submit,

    /// Approval code issued for a supervisor
    ApprovalCodeIssued,

    /// Supervisor authorization succeeded, download token issued
    AuthorizeSuccess,

    /// Supervisor authorization failed (bad code or password)
    AuthorizeFailed,

    /// Artifact downloaded
    Download,

    /// Renderer failed after token validation; token restored
    DownloadFailed,
}

impl AuditAction {
    /// Get the action name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::FieldUpdate => "field_update",
            AuditAction::UnauthorizedFieldAttempt => "unauthorized_field_attempt",
            AuditAction::Submit => "submit",
            AuditAction::ApprovalCodeIssued => "approval_code_issued",
            AuditAction::AuthorizeSuccess => "authorize_success",
            AuditAction::AuthorizeFailed => "authorize_failed",
            AuditAction::Download => "download",
            AuditAction::DownloadFailed => "download_failed",
        }
    }
}

/// One immutable record in a review's audit trail
///
/// Entries are append-only: ordering is insertion order and entries are
/// never edited or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// When the action happened (seconds since Unix epoch)
    pub timestamp: u64,

    /// What happened
    pub action: AuditAction,

    /// Who did it (author id, or the supervisor identity)
    pub actor: String,

    /// Field affected, for field-level actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,

    /// Value before the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    /// Value after the change (or the rejected attempted value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,

    /// Network origin of the request, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Client user agent, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Free-text detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditLogEntry {
    /// Create an entry timestamped now
    pub fn new(action: AuditAction, actor: impl Into<String>) -> Self {
        Self {
            timestamp: epoch_secs(),
            action,
            actor: actor.into(),
            field_name: None,
            old_value: None,
            new_value: None,
            origin: None,
            user_agent: None,
            details: None,
        }
    }

    /// Attach the affected field name
    pub fn with_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Attach the old/new value pair
    pub fn with_values(mut self, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    /// Attach the network origin
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach the client user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Attach free-text detail
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
