//! Ephemeral credentials: approval codes and download tokens

use serde::{Deserialize, Serialize};

use crate::clock::epoch_secs;
use crate::review::ReviewId;

/// Supervisor-bound, review-bound, time-limited single-use code
///
/// The code string is short and human-readable so it can be relayed
/// out-of-band; the supervisor's password check and the TTL compensate
/// for the reduced code space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalCode {
    /// The 8-character uppercase code
    pub code: String,

    /// Review this code authorizes
    pub review_id: ReviewId,

    /// Supervisor this code is bound to
    pub supervisor_id: String,

    /// Issue time (seconds since Unix epoch)
    pub created_at: u64,

    /// Expiry time (seconds since Unix epoch)
    pub expires_at: u64,

    /// Whether the code has been consumed
    pub used: bool,

    /// When the code was consumed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<u64>,
}

impl ApprovalCode {
    /// Whether the code has expired as of `now`
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// Whether the code is still usable as of `now`
    pub fn is_valid_at(&self, now: u64) -> bool {
        !self.used && !self.is_expired_at(now)
    }

    /// Whether the code is still usable right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(epoch_secs())
    }
}

/// Opaque, review-bound, time-limited single-use download token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadToken {
    /// URL-safe random token string
    pub token: String,

    /// Review this token unlocks
    pub review_id: ReviewId,

    /// Issue time (seconds since Unix epoch)
    pub created_at: u64,

    /// Expiry time (seconds since Unix epoch)
    pub expires_at: u64,

    /// Whether the token has been consumed
    pub used: bool,

    /// When the token was consumed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<u64>,
}

impl DownloadToken {
    /// Whether the token has expired as of `now`
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// Whether the token is still usable as of `now`
    pub fn is_valid_at(&self, now: u64) -> bool {
        !self.used && !self.is_expired_at(now)
    }

    /// Whether the token is still usable right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(epoch_secs())
    }
}
