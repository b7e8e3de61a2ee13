//! Countersign Storage Layer
//!
//! Implements the `ReviewStore` and `CredentialStore` traits on SQLite.
//!
//! # Architecture
//!
//! - One row per review; the data map and audit log persist as JSON columns
//! - Approval codes and download tokens in their own keyed tables
//! - Check-and-mark-used for codes and tokens is a single guarded UPDATE,
//!   so single-use semantics hold under concurrent access
//!
//! # Thread Safety
//!
//! The connection sits behind a mutex: every snapshot write is exclusive
//! and reads are serialized with writes. Read-modify-write atomicity
//! across an operation (validate, mutate, persist) is the workflow
//! layer's per-review lock, not this crate's concern.
//!
//! # Examples
//!
//! ```no_run
//! use countersign_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for review and credential operations
//! ```

#![warn(missing_docs)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use countersign_domain::traits::{CredentialStore, ReviewFilter, ReviewStore};
use countersign_domain::{ApprovalCode, DownloadToken, Review, ReviewId, ReviewStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON (de)serialization error for a stored column
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data found in a stored row
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// SQLite-based implementation of the review and credential stores
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new store with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn().execute_batch(schema)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Recover the guard if a previous holder panicked; SQLite state
        // stays consistent because each statement is transactional.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_to_review(row: &Row<'_>) -> Result<Review, StoreError> {
        let id: String = row.get("id")?;
        let status: String = row.get("status")?;
        let data: String = row.get("data")?;
        let audit_log: String = row.get("audit_log")?;

        Ok(Review {
            id: ReviewId::from_string(&id).map_err(StoreError::InvalidData)?,
            doc_type: row.get("doc_type")?,
            status: ReviewStatus::parse(&status)
                .ok_or_else(|| StoreError::InvalidData(format!("Unknown status: {}", status)))?,
            data: serde_json::from_str(&data)?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            audit_log: serde_json::from_str(&audit_log)?,
            submitted_at: row.get("submitted_at")?,
            downloaded_at: row.get("downloaded_at")?,
            downloaded_by: row.get("downloaded_by")?,
        })
    }

    fn row_to_code(row: &Row<'_>) -> Result<ApprovalCode, StoreError> {
        let review_id: String = row.get("review_id")?;
        Ok(ApprovalCode {
            code: row.get("code")?,
            review_id: ReviewId::from_string(&review_id).map_err(StoreError::InvalidData)?,
            supervisor_id: row.get("supervisor_id")?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
            used: row.get::<_, i64>("used")? != 0,
            used_at: row.get("used_at")?,
        })
    }

    fn row_to_token(row: &Row<'_>) -> Result<DownloadToken, StoreError> {
        let review_id: String = row.get("review_id")?;
        Ok(DownloadToken {
            token: row.get("token")?,
            review_id: ReviewId::from_string(&review_id).map_err(StoreError::InvalidData)?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
            used: row.get::<_, i64>("used")? != 0,
            used_at: row.get("used_at")?,
        })
    }
}

impl ReviewStore for SqliteStore {
    type Error = StoreError;

    fn save_review(&self, review: &Review) -> Result<(), Self::Error> {
        let data = serde_json::to_string(&review.data)?;
        let audit_log = serde_json::to_string(&review.audit_log)?;

        self.conn().execute(
            "INSERT OR REPLACE INTO reviews
                (id, doc_type, status, created_by, created_at,
                 submitted_at, downloaded_at, downloaded_by, data, audit_log)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                review.id.to_string(),
                review.doc_type,
                review.status.as_str(),
                review.created_by,
                review.created_at,
                review.submitted_at,
                review.downloaded_at,
                review.downloaded_by,
                data,
                audit_log,
            ],
        )?;

        debug!(review_id = %review.id, status = %review.status, "review snapshot saved");
        Ok(())
    }

    fn load_review(&self, id: ReviewId) -> Result<Option<Review>, Self::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM reviews WHERE id = ?1")?;
        let review = stmt
            .query_row(params![id.to_string()], |row| {
                Ok(Self::row_to_review(row))
            })
            .optional()?;
        review.transpose()
    }

    fn review_exists(&self, id: ReviewId) -> Result<bool, Self::Error> {
        let exists: bool = self
            .conn()
            .query_row(
                "SELECT 1 FROM reviews WHERE id = ?1",
                params![id.to_string()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>, Self::Error> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT * FROM reviews ORDER BY created_at DESC, rowid DESC")?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_review(row)))?;

        let mut reviews = Vec::new();
        for row in rows {
            let review = row??;
            if let Some(status) = filter.status {
                if review.status != status {
                    continue;
                }
            }
            if let Some(created_by) = &filter.created_by {
                if &review.created_by != created_by {
                    continue;
                }
            }
            reviews.push(review);
        }
        Ok(reviews)
    }
}

impl CredentialStore for SqliteStore {
    type Error = StoreError;

    fn put_code(&self, code: &ApprovalCode) -> Result<(), Self::Error> {
        self.conn().execute(
            "INSERT INTO approval_codes
                (code, review_id, supervisor_id, created_at, expires_at, used, used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                code.code,
                code.review_id.to_string(),
                code.supervisor_id,
                code.created_at,
                code.expires_at,
                code.used as i64,
                code.used_at,
            ],
        )?;
        Ok(())
    }

    fn get_code(&self, code: &str) -> Result<Option<ApprovalCode>, Self::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM approval_codes WHERE code = ?1")?;
        let record = stmt
            .query_row(params![code], |row| Ok(Self::row_to_code(row)))
            .optional()?;
        record.transpose()
    }

    fn code_exists(&self, code: &str) -> Result<bool, Self::Error> {
        let exists: bool = self
            .conn()
            .query_row(
                "SELECT 1 FROM approval_codes WHERE code = ?1",
                params![code],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    fn mark_code_used(&self, code: &str, used_at: u64) -> Result<bool, Self::Error> {
        let changed = self.conn().execute(
            "UPDATE approval_codes SET used = 1, used_at = ?2
             WHERE code = ?1 AND used = 0",
            params![code, used_at],
        )?;
        Ok(changed == 1)
    }

    fn codes_for_review(&self, review_id: ReviewId) -> Result<Vec<ApprovalCode>, Self::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM approval_codes WHERE review_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![review_id.to_string()], |row| {
            Ok(Self::row_to_code(row))
        })?;

        let mut codes = Vec::new();
        for row in rows {
            codes.push(row??);
        }
        Ok(codes)
    }

    fn purge_expired_codes(&self, now: u64) -> Result<usize, Self::Error> {
        // Used codes stay behind for the audit record
        let removed = self.conn().execute(
            "DELETE FROM approval_codes WHERE used = 0 AND expires_at < ?1",
            params![now],
        )?;
        if removed > 0 {
            debug!(removed, "expired approval codes purged");
        }
        Ok(removed)
    }

    fn put_token(&self, token: &DownloadToken) -> Result<(), Self::Error> {
        self.conn().execute(
            "INSERT INTO download_tokens
                (token, review_id, created_at, expires_at, used, used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.token,
                token.review_id.to_string(),
                token.created_at,
                token.expires_at,
                token.used as i64,
                token.used_at,
            ],
        )?;
        Ok(())
    }

    fn get_token(&self, token: &str) -> Result<Option<DownloadToken>, Self::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM download_tokens WHERE token = ?1")?;
        let record = stmt
            .query_row(params![token], |row| Ok(Self::row_to_token(row)))
            .optional()?;
        record.transpose()
    }

    fn consume_token(
        &self,
        token: &str,
        review_id: ReviewId,
        now: u64,
    ) -> Result<bool, Self::Error> {
        // Single guarded UPDATE: binding, unused, and unexpired are all
        // checked in the same statement that flips the used flag
        let changed = self.conn().execute(
            "UPDATE download_tokens SET used = 1, used_at = ?3
             WHERE token = ?1 AND review_id = ?2 AND used = 0 AND expires_at >= ?3",
            params![token, review_id.to_string(), now],
        )?;
        Ok(changed == 1)
    }

    fn restore_token(&self, token: &str) -> Result<(), Self::Error> {
        self.conn().execute(
            "UPDATE download_tokens SET used = 0, used_at = NULL WHERE token = ?1",
            params![token],
        )?;
        Ok(())
    }

    fn purge_expired_tokens(&self, now: u64) -> Result<usize, Self::Error> {
        let removed = self.conn().execute(
            "DELETE FROM download_tokens WHERE used = 0 AND expires_at < ?1",
            params![now],
        )?;
        if removed > 0 {
            debug!(removed, "expired download tokens purged");
        }
        Ok(removed)
    }
}
