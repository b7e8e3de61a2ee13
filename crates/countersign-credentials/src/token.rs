//! Download token issuance and consumption

use std::fmt::Display;
use std::sync::Arc;

use countersign_domain::clock::epoch_secs;
use countersign_domain::traits::CredentialStore;
use countersign_domain::{DownloadToken, ReviewId};
use rand::rngs::OsRng;
use rand::Rng;
use tracing::{info, warn};

use crate::error::CredentialError;

/// URL-safe token alphabet
const TOKEN_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Token length in characters (~256 bits from a 64-symbol alphabet)
const TOKEN_LEN: usize = 43;

/// Default token lifetime in seconds
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

/// Issues and consumes single-use download tokens
///
/// Consumption is exactly-once: the used flag flips atomically at
/// validation time, before any artifact bytes are produced, so a
/// concurrent second redemption of the same token always fails.
pub struct DownloadTokenService<S> {
    store: Arc<S>,
    ttl_seconds: u64,
}

impl<S> DownloadTokenService<S>
where
    S: CredentialStore,
    S::Error: Display,
{
    /// Create a service with the given default token TTL in seconds
    pub fn new(store: Arc<S>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// The configured default TTL in seconds
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a new token for a review with the default TTL
    pub fn create_token(&self, review_id: ReviewId) -> Result<DownloadToken, CredentialError> {
        self.create_token_with_ttl(review_id, self.ttl_seconds)
    }

    /// Issue a new token for a review with an explicit TTL
    pub fn create_token_with_ttl(
        &self,
        review_id: ReviewId,
        ttl_seconds: u64,
    ) -> Result<DownloadToken, CredentialError> {
        let now = epoch_secs();
        let token = DownloadToken {
            token: generate_token(),
            review_id,
            created_at: now,
            expires_at: now + ttl_seconds,
            used: false,
            used_at: None,
        };

        self.store
            .put_token(&token)
            .map_err(|e| CredentialError::Store(e.to_string()))?;

        info!(%review_id, ttl_seconds, "download token issued");
        Ok(token)
    }

    /// Validate a token and consume it in the same step
    ///
    /// Fails closed: returns false unless the token exists, is bound to
    /// `review_id`, is unused, and is unexpired. On success the token is
    /// already marked used when this returns.
    pub fn validate_and_consume(
        &self,
        token: &str,
        review_id: ReviewId,
    ) -> Result<bool, CredentialError> {
        let consumed = self
            .store
            .consume_token(token, review_id, epoch_secs())
            .map_err(|e| CredentialError::Store(e.to_string()))?;
        if !consumed {
            warn!(%review_id, "download token rejected");
        }
        Ok(consumed)
    }

    /// Look up a token without consuming it (preview/audit views)
    pub fn inspect(&self, token: &str) -> Result<Option<DownloadToken>, CredentialError> {
        self.store
            .get_token(token)
            .map_err(|e| CredentialError::Store(e.to_string()))
    }

    /// Return a consumed token to the unused state
    ///
    /// Called when the renderer fails after the token was consumed, so
    /// the same token stays good for a retry.
    pub fn restore(&self, token: &str) -> Result<(), CredentialError> {
        self.store
            .restore_token(token)
            .map_err(|e| CredentialError::Store(e.to_string()))
    }

    /// Drop expired, never-used tokens
    pub fn cleanup_expired(&self) -> Result<usize, CredentialError> {
        self.store
            .purge_expired_tokens(epoch_secs())
            .map_err(|e| CredentialError::Store(e.to_string()))
    }
}

fn generate_token() -> String {
    (0..TOKEN_LEN)
        .map(|_| {
            let idx = OsRng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}
