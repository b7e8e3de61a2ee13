//! Approval code issuance and validation

use std::fmt::Display;
use std::sync::Arc;

use countersign_domain::clock::epoch_secs;
use countersign_domain::traits::CredentialStore;
use countersign_domain::{ApprovalCode, ReviewId};
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CredentialError;
use crate::supervisor::SupervisorDirectory;

/// Code alphabet: uppercase letters and digits, relayable out-of-band
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Code length in characters
const CODE_LEN: usize = 8;

/// Default code lifetime in hours
pub const DEFAULT_CODE_TTL_HOURS: u64 = 72;

/// Display view of an approval code, for listings and status pages
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalCodeInfo {
    /// The code string
    pub code: String,

    /// Bound review
    pub review_id: ReviewId,

    /// Bound supervisor id
    pub supervisor_id: String,

    /// Supervisor display name, when still in the directory
    pub supervisor_name: String,

    /// Issue time
    pub created_at: u64,

    /// Expiry time
    pub expires_at: u64,

    /// Whether the code has been consumed
    pub used: bool,

    /// Whether the code is currently usable
    pub is_valid: bool,
}

/// Issues and validates supervisor-bound approval codes
///
/// Codes are deliberately short and human-readable: they are relayed
/// between author and supervisor out-of-band, and the supervisor's
/// password check plus the TTL compensate for the reduced code space.
pub struct ApprovalCodeService<S> {
    store: Arc<S>,
    directory: Arc<SupervisorDirectory>,
    ttl_hours: u64,
}

impl<S> ApprovalCodeService<S>
where
    S: CredentialStore,
    S::Error: Display,
{
    /// Create a service with the given code TTL in hours
    pub fn new(store: Arc<S>, directory: Arc<SupervisorDirectory>, ttl_hours: u64) -> Self {
        Self {
            store,
            directory,
            ttl_hours,
        }
    }

    /// The supervisor directory codes are checked against
    pub fn directory(&self) -> &SupervisorDirectory {
        &self.directory
    }

    /// Issue a new code binding `review_id` to `supervisor_id`
    ///
    /// The generated code is unique among currently stored codes;
    /// generation retries on collision.
    pub fn create_code(
        &self,
        review_id: ReviewId,
        supervisor_id: &str,
    ) -> Result<ApprovalCode, CredentialError> {
        if self.directory.get(supervisor_id).is_none() {
            return Err(CredentialError::UnknownSupervisor(
                supervisor_id.to_string(),
            ));
        }

        let code = self.generate_unique_code()?;
        let now = epoch_secs();
        let record = ApprovalCode {
            code: code.clone(),
            review_id,
            supervisor_id: supervisor_id.to_string(),
            created_at: now,
            expires_at: now + self.ttl_hours * 3600,
            used: false,
            used_at: None,
        };

        self.store
            .put_code(&record)
            .map_err(|e| CredentialError::Store(e.to_string()))?;

        info!(%review_id, supervisor_id, "approval code issued");
        Ok(record)
    }

    /// Validate a code without consuming it
    ///
    /// Input is trimmed and case-normalized. Distinguishes absent,
    /// already-used, and expired codes.
    pub fn validate_code(&self, code: &str) -> Result<ApprovalCode, CredentialError> {
        let code = normalize(code);

        let record = self
            .store
            .get_code(&code)
            .map_err(|e| CredentialError::Store(e.to_string()))?
            .ok_or(CredentialError::NotFound)?;

        if record.used {
            warn!(%code, "rejected already-used approval code");
            return Err(CredentialError::AlreadyUsed);
        }
        if record.is_expired_at(epoch_secs()) {
            warn!(%code, "rejected expired approval code");
            return Err(CredentialError::Expired);
        }

        Ok(record)
    }

    /// Consume a code; returns true at most once per code
    pub fn use_code(&self, code: &str) -> Result<bool, CredentialError> {
        let code = normalize(code);
        self.store
            .mark_code_used(&code, epoch_secs())
            .map_err(|e| CredentialError::Store(e.to_string()))
    }

    /// Display view of a code, if it exists
    pub fn code_info(&self, code: &str) -> Result<Option<ApprovalCodeInfo>, CredentialError> {
        let code = normalize(code);
        let record = self
            .store
            .get_code(&code)
            .map_err(|e| CredentialError::Store(e.to_string()))?;
        Ok(record.map(|r| self.to_info(r)))
    }

    /// All codes issued for a review, newest first
    pub fn codes_for_review(
        &self,
        review_id: ReviewId,
    ) -> Result<Vec<ApprovalCodeInfo>, CredentialError> {
        let records = self
            .store
            .codes_for_review(review_id)
            .map_err(|e| CredentialError::Store(e.to_string()))?;
        Ok(records.into_iter().map(|r| self.to_info(r)).collect())
    }

    /// Drop expired, never-used codes; used ones stay for the audit record
    pub fn cleanup_expired(&self) -> Result<usize, CredentialError> {
        self.store
            .purge_expired_codes(epoch_secs())
            .map_err(|e| CredentialError::Store(e.to_string()))
    }

    fn to_info(&self, record: ApprovalCode) -> ApprovalCodeInfo {
        let supervisor_name = self
            .directory
            .get(&record.supervisor_id)
            .map(|s| s.name)
            .unwrap_or_else(|| "Unknown".to_string());
        let is_valid = record.is_valid();

        ApprovalCodeInfo {
            code: record.code,
            review_id: record.review_id,
            supervisor_id: record.supervisor_id,
            supervisor_name,
            created_at: record.created_at,
            expires_at: record.expires_at,
            used: record.used,
            is_valid,
        }
    }

    fn generate_unique_code(&self) -> Result<String, CredentialError> {
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| {
                    let idx = OsRng.gen_range(0..CODE_CHARSET.len());
                    CODE_CHARSET[idx] as char
                })
                .collect();

            let taken = self
                .store
                .code_exists(&code)
                .map_err(|e| CredentialError::Store(e.to_string()))?;
            if !taken {
                return Ok(code);
            }
        }
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use countersign_store::SqliteStore;

    fn service() -> ApprovalCodeService<SqliteStore> {
        let store = Arc::new(SqliteStore::new(":memory:").unwrap());
        let directory = Arc::new(
            SupervisorDirectory::from_toml_str(
                r#"
                [supervisors.maria]
                name = "Maria Jose"
                password = "s3cret"
                "#,
            )
            .unwrap(),
        );
        ApprovalCodeService::new(store, directory, DEFAULT_CODE_TTL_HOURS)
    }

    #[test]
    fn test_create_code_shape() {
        let service = service();
        let record = service.create_code(ReviewId::new(), "maria").unwrap();

        assert_eq!(record.code.len(), 8);
        assert!(record
            .code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(record.expires_at - record.created_at, 72 * 3600);
        assert!(!record.used);
    }

    #[test]
    fn test_create_code_unknown_supervisor() {
        let service = service();
        let err = service.create_code(ReviewId::new(), "nobody").unwrap_err();
        assert!(matches!(err, CredentialError::UnknownSupervisor(_)));
    }

    #[test]
    fn test_validate_normalizes_input() {
        let service = service();
        let record = service.create_code(ReviewId::new(), "maria").unwrap();

        let sloppy = format!("  {}  ", record.code.to_lowercase());
        let validated = service.validate_code(&sloppy).unwrap();
        assert_eq!(validated.code, record.code);
    }

    #[test]
    fn test_validate_missing_code() {
        let service = service();
        assert!(matches!(
            service.validate_code("NOPE0000"),
            Err(CredentialError::NotFound)
        ));
    }

    #[test]
    fn test_use_code_exactly_once() {
        let service = service();
        let record = service.create_code(ReviewId::new(), "maria").unwrap();

        assert!(service.use_code(&record.code).unwrap());
        assert!(!service.use_code(&record.code).unwrap());
        assert!(matches!(
            service.validate_code(&record.code),
            Err(CredentialError::AlreadyUsed)
        ));
    }

    #[test]
    fn test_expired_code_rejected() {
        let service = service();
        let review_id = ReviewId::new();

        // Plant a code that expired long ago
        let expired = ApprovalCode {
            code: "OLDCODE1".to_string(),
            review_id,
            supervisor_id: "maria".to_string(),
            created_at: 1000,
            expires_at: 2000,
            used: false,
            used_at: None,
        };
        service.store.put_code(&expired).unwrap();

        assert!(matches!(
            service.validate_code("OLDCODE1"),
            Err(CredentialError::Expired)
        ));
    }

    #[test]
    fn test_code_info_includes_supervisor_name() {
        let service = service();
        let record = service.create_code(ReviewId::new(), "maria").unwrap();

        let info = service.code_info(&record.code).unwrap().unwrap();
        assert_eq!(info.supervisor_name, "Maria Jose");
        assert!(info.is_valid);

        assert!(service.code_info("MISSING0").unwrap().is_none());
    }

    #[test]
    fn test_codes_for_review() {
        let service = service();
        let review_id = ReviewId::new();

        service.create_code(review_id, "maria").unwrap();
        service.create_code(review_id, "maria").unwrap();
        service.create_code(ReviewId::new(), "maria").unwrap();

        let codes = service.codes_for_review(review_id).unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.iter().all(|c| c.review_id == review_id));
    }
}
