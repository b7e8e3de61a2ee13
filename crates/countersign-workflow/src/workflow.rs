//! The workflow orchestrator

use std::fmt::Display;
use std::sync::Arc;

use countersign_composer::generate_variables;
use countersign_credentials::{
    ApprovalCodeInfo, ApprovalCodeService, DownloadTokenService, SupervisorDirectory,
};
use countersign_domain::traits::{
    CredentialStore, RenderedArtifact, Renderer, ReviewFilter, ReviewStore,
};
use countersign_domain::{
    AuditAction, AuditLogEntry, DataMap, Review, ReviewId, ReviewStatus, StateError, Supervisor,
};
use countersign_gatekeeper::{FieldError, SchemaValidator, ValidationResult};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::locks::{hold, ReviewLocks};

/// Response to a successful review creation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedReview {
    /// The new review's id
    pub review_id: ReviewId,

    /// Its status (always DRAFT)
    pub status: ReviewStatus,

    /// Supervisor entry link
    pub manager_link: String,
}

/// A review's current data, annotated for the editing boundary
#[derive(Debug, Clone, Serialize)]
pub struct ReviewData {
    /// Review id
    pub review_id: ReviewId,

    /// Document type
    pub doc_type: String,

    /// Lifecycle status
    pub status: ReviewStatus,

    /// The full data map
    pub data: DataMap,

    /// Fields the author is permitted to mutate
    pub editable_fields: Vec<String>,

    /// Whether edits are currently possible
    pub can_edit: bool,
}

/// Outcome of a partial update
///
/// Aggregated, never thrown: one response can report accepted, rejected,
/// and invalid fields together.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    /// Whether every authorized field passed validation
    pub success: bool,

    /// Fields applied to the data map
    pub updated_fields: Vec<String>,

    /// Fields rejected by the whitelist
    pub rejected_fields: Vec<String>,

    /// Per-field validation failures
    pub errors: Vec<FieldError>,
}

/// Response to a successful submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    /// The frozen review's status (always SUBMITTED)
    pub status: ReviewStatus,

    /// Supervisor entry link
    pub manager_link: String,
}

/// Response to a successful approval-code request
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCode {
    /// The code to relay to the supervisor
    pub code: String,

    /// Supervisor display name
    pub supervisor_name: String,

    /// Expiry time (seconds since Unix epoch)
    pub expires_at: u64,
}

/// Response to a successful authorization
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// The single-use download token
    pub download_token: String,

    /// Seconds until the token expires
    pub expires_in: u64,
}

/// Lightweight status view for the authoring boundary
#[derive(Debug, Clone, Serialize)]
pub struct ReviewStatusView {
    /// Review id
    pub review_id: ReviewId,

    /// Lifecycle status
    pub status: ReviewStatus,

    /// Whether edits are currently possible
    pub can_edit: bool,

    /// Whether submission is currently possible
    pub can_submit: bool,

    /// When the review was frozen
    pub submitted_at: Option<u64>,

    /// Supervisor entry link, once the review has left DRAFT
    pub manager_link: Option<String>,
}

/// Public summary with no data map exposure
#[derive(Debug, Clone, Serialize)]
pub struct ReviewInfo {
    /// Review id
    pub review_id: ReviewId,

    /// Document type
    pub doc_type: String,

    /// Lifecycle status
    pub status: ReviewStatus,

    /// Creation time
    pub created_at: u64,

    /// When the review was frozen
    pub submitted_at: Option<u64>,

    /// When the artifact was retrieved
    pub downloaded_at: Option<u64>,

    /// Whether a download is currently possible
    pub can_download: bool,
}

/// The workflow orchestrator
///
/// Generic over the store (`S`) and the external renderer (`R`); both
/// plug in through the domain traits. One instance serves all requests.
pub struct Workflow<S, R> {
    store: Arc<S>,
    validator: SchemaValidator,
    codes: ApprovalCodeService<S>,
    tokens: DownloadTokenService<S>,
    renderer: R,
    config: WorkflowConfig,
    locks: ReviewLocks,
}

impl<S, R> Workflow<S, R>
where
    S: ReviewStore + CredentialStore,
    <S as ReviewStore>::Error: Display,
    <S as CredentialStore>::Error: Display,
    R: Renderer,
    R::Error: Display,
{
    /// Assemble the orchestrator from its collaborators
    pub fn new(
        store: Arc<S>,
        validator: SchemaValidator,
        directory: Arc<SupervisorDirectory>,
        renderer: R,
        config: WorkflowConfig,
    ) -> Self {
        let codes = ApprovalCodeService::new(
            Arc::clone(&store),
            directory,
            config.approval_code_ttl_hours,
        );
        let tokens =
            DownloadTokenService::new(Arc::clone(&store), config.download_token_ttl_seconds);

        Self {
            store,
            validator,
            codes,
            tokens,
            renderer,
            config,
            locks: ReviewLocks::new(),
        }
    }

    /// Create a new review in DRAFT status
    pub fn create_review(
        &self,
        doc_type: &str,
        initial_data: DataMap,
        created_by: &str,
        origin: Option<&str>,
    ) -> Result<CreatedReview, WorkflowError> {
        // The schema must exist before the review is constructed
        self.validator.load_schema(doc_type)?;

        let mut review = Review::create(doc_type, initial_data, created_by);
        if let (Some(origin), Some(entry)) = (origin, review.audit_log.last_mut()) {
            entry.origin = Some(origin.to_string());
        }

        self.save(&review)?;
        info!(review_id = %review.id, doc_type, created_by, "review created");

        Ok(CreatedReview {
            review_id: review.id,
            status: review.status,
            manager_link: review.manager_link(&self.config.base_url),
        })
    }

    /// A review's data, annotated with the editable-field set
    pub fn get_data(&self, review_id: ReviewId) -> Result<ReviewData, WorkflowError> {
        let review = self.load(review_id)?;
        let editable_fields = self.validator.editable_fields(&review.doc_type)?;

        Ok(ReviewData {
            review_id: review.id,
            doc_type: review.doc_type.clone(),
            status: review.status,
            data: review.data.clone(),
            editable_fields,
            can_edit: review.can_edit(),
        })
    }

    /// Apply a whitelist-gated partial update
    ///
    /// Unauthorized fields never touch the data map; each one is logged
    /// as an unauthorized attempt. Validation failures are aggregated in
    /// the outcome rather than aborting the accepted fields.
    pub fn update_data(
        &self,
        review_id: ReviewId,
        proposed_changes: &DataMap,
        actor: &str,
        origin: Option<&str>,
    ) -> Result<UpdateOutcome, WorkflowError> {
        let lock = self.locks.for_review(review_id);
        let _guard = hold(&lock);

        let mut review = self.load(review_id)?;
        if !review.can_edit() {
            return Err(WorkflowError::Forbidden(format!(
                "Review is {} and cannot be edited",
                review.status
            )));
        }

        let result: ValidationResult = self
            .validator
            .validate_update(&review.doc_type, proposed_changes)?;

        for field in &result.unauthorized_fields {
            review.log_unauthorized_attempt(
                field,
                proposed_changes.get(field).cloned(),
                actor,
                origin,
            );
        }

        let mut updated_fields = Vec::new();
        for (field, value) in &result.filtered_data {
            if review
                .update_field(field, value.clone(), actor, origin)
                .is_ok()
            {
                updated_fields.push(field.clone());
            }
        }

        self.save(&review)?;

        Ok(UpdateOutcome {
            success: result.is_valid,
            updated_fields,
            rejected_fields: result.unauthorized_fields,
            errors: result.errors,
        })
    }

    /// Freeze a review for supervisor approval
    pub fn submit(
        &self,
        review_id: ReviewId,
        actor: &str,
        origin: Option<&str>,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let lock = self.locks.for_review(review_id);
        let _guard = hold(&lock);

        let mut review = self.load(review_id)?;
        review
            .submit(actor, origin)
            .map_err(|e| state_error(&review, e))?;
        self.save(&review)?;

        info!(%review_id, actor, "review submitted");
        Ok(SubmitOutcome {
            status: review.status,
            manager_link: review.manager_link(&self.config.base_url),
        })
    }

    /// Issue an approval code binding a submitted review to a supervisor
    pub fn request_approval_code(
        &self,
        review_id: ReviewId,
        supervisor_id: &str,
        origin: Option<&str>,
    ) -> Result<IssuedCode, WorkflowError> {
        let lock = self.locks.for_review(review_id);
        let _guard = hold(&lock);

        let mut review = self.load(review_id)?;
        if review.status != ReviewStatus::Submitted {
            return Err(WorkflowError::Forbidden(format!(
                "Review is {}; approval codes require a submitted review",
                review.status
            )));
        }

        let record = self.codes.create_code(review_id, supervisor_id)?;
        let supervisor_name = self
            .codes
            .directory()
            .get(supervisor_id)
            .map(|s| s.name)
            .unwrap_or_else(|| supervisor_id.to_string());

        let mut entry = AuditLogEntry::new(AuditAction::ApprovalCodeIssued, &review.created_by)
            .with_details(format!("Approval code issued for supervisor {}", supervisor_id));
        if let Some(origin) = origin {
            entry = entry.with_origin(origin);
        }
        review.append_audit(entry);
        self.save(&review)?;

        Ok(IssuedCode {
            code: record.code,
            supervisor_name,
            expires_at: record.expires_at,
        })
    }

    /// Authorize a supervisor: approval code plus password in, download
    /// token out
    ///
    /// The code is consumed exactly once on success. Every failure mode
    /// appends its own audit entry to the bound review before the error
    /// returns (when the review is identifiable).
    pub fn authorize(
        &self,
        approval_code: &str,
        password: &str,
        origin: Option<&str>,
    ) -> Result<IssuedToken, WorkflowError> {
        let record = match self.codes.validate_code(approval_code) {
            Ok(record) => record,
            Err(err) => {
                let mapped = WorkflowError::from(err);
                self.audit_authorize_failure(approval_code, origin, &mapped);
                return Err(mapped);
            }
        };

        let lock = self.locks.for_review(record.review_id);
        let _guard = hold(&lock);

        let mut review = self.load(record.review_id)?;
        if !review.can_download() {
            return Err(WorkflowError::Forbidden(format!(
                "Review is {}; only submitted reviews can be authorized",
                review.status
            )));
        }

        if !self
            .codes
            .directory()
            .verify_password(&record.supervisor_id, password)
        {
            warn!(supervisor_id = %record.supervisor_id, "authorization failed: bad password");
            let mut entry = AuditLogEntry::new(AuditAction::AuthorizeFailed, &record.supervisor_id)
                .with_details("Invalid supervisor password");
            if let Some(origin) = origin {
                entry = entry.with_origin(origin);
            }
            review.append_audit(entry);
            self.save(&review)?;
            return Err(WorkflowError::WrongPassword);
        }

        // Consume the code; a concurrent winner leaves nothing for us
        if !self.codes.use_code(&record.code)? {
            return Err(WorkflowError::CodeAlreadyUsed);
        }

        let token = self.tokens.create_token(record.review_id)?;

        let mut entry = AuditLogEntry::new(AuditAction::AuthorizeSuccess, &record.supervisor_id)
            .with_details(format!(
                "Download token issued, expires in {}s",
                self.tokens.ttl_seconds()
            ));
        if let Some(origin) = origin {
            entry = entry.with_origin(origin);
        }
        review.append_audit(entry);
        self.save(&review)?;

        Ok(IssuedToken {
            download_token: token.token,
            expires_in: self.tokens.ttl_seconds(),
        })
    }

    /// Redeem a download token for the rendered artifact
    ///
    /// The token is consumed atomically before rendering; if the
    /// renderer fails, the token is restored so the supervisor can retry
    /// and the review is not marked downloaded.
    pub fn download(
        &self,
        review_id: ReviewId,
        token: &str,
        actor: &str,
        origin: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<RenderedArtifact, WorkflowError> {
        let lock = self.locks.for_review(review_id);
        let _guard = hold(&lock);

        let mut review = self.load(review_id)?;
        if !matches!(
            review.status,
            ReviewStatus::Submitted | ReviewStatus::Downloaded
        ) {
            return Err(WorkflowError::Forbidden(format!(
                "Review is {}; only submitted reviews can be downloaded",
                review.status
            )));
        }

        if !self.tokens.validate_and_consume(token, review_id)? {
            let mut entry = AuditLogEntry::new(AuditAction::DownloadFailed, actor)
                .with_details("Invalid or expired download token");
            if let Some(origin) = origin {
                entry = entry.with_origin(origin);
            }
            review.append_audit(entry);
            self.save(&review)?;
            return Err(WorkflowError::InvalidToken);
        }

        let render_data = self.render_data(&review)?;
        match self
            .renderer
            .render(&review.doc_type, &render_data, review_id)
        {
            Ok(artifact) => {
                if review.can_download() {
                    review
                        .mark_downloaded(actor, origin, user_agent)
                        .map_err(|e| state_error(&review, e))?;
                }
                self.save(&review)?;
                info!(%review_id, actor, "artifact downloaded");
                Ok(artifact)
            }
            Err(err) => {
                warn!(%review_id, %err, "render failed; restoring download token");
                self.tokens.restore(token)?;
                review.append_audit(
                    AuditLogEntry::new(AuditAction::DownloadFailed, actor)
                        .with_details(format!("Renderer failed: {}; token restored", err)),
                );
                self.save(&review)?;
                Err(WorkflowError::Render(err.to_string()))
            }
        }
    }

    /// The audit trail, gated by a token bound to the review
    ///
    /// Viewing the trail does not consume the token.
    pub fn audit_log(
        &self,
        review_id: ReviewId,
        token: &str,
    ) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        let review = self.load(review_id)?;

        let bound = self
            .tokens
            .inspect(token)?
            .map(|t| t.review_id == review_id)
            .unwrap_or(false);
        if !bound {
            return Err(WorkflowError::InvalidToken);
        }

        Ok(review.audit_log)
    }

    /// Lightweight status view
    pub fn review_status(&self, review_id: ReviewId) -> Result<ReviewStatusView, WorkflowError> {
        let review = self.load(review_id)?;
        let manager_link = (review.status != ReviewStatus::Draft)
            .then(|| review.manager_link(&self.config.base_url));

        Ok(ReviewStatusView {
            review_id: review.id,
            status: review.status,
            can_edit: review.can_edit(),
            can_submit: review.can_submit(),
            submitted_at: review.submitted_at,
            manager_link,
        })
    }

    /// Public summary with no data map exposure
    pub fn review_info(&self, review_id: ReviewId) -> Result<ReviewInfo, WorkflowError> {
        let review = self.load(review_id)?;
        Ok(ReviewInfo {
            review_id: review.id,
            doc_type: review.doc_type.clone(),
            status: review.status,
            created_at: review.created_at,
            submitted_at: review.submitted_at,
            downloaded_at: review.downloaded_at,
            can_download: review.can_download(),
        })
    }

    /// List reviews, optionally filtered, newest first
    pub fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>, WorkflowError> {
        self.store
            .list_reviews(filter)
            .map_err(|e| WorkflowError::Store(e.to_string()))
    }

    /// Active supervisors, display-safe
    pub fn supervisors(&self) -> Vec<Supervisor> {
        self.codes.directory().list()
    }

    /// Validate complete data against the full schema (creation path)
    pub fn validate_initial_data(
        &self,
        doc_type: &str,
        data: &DataMap,
    ) -> Result<ValidationResult, WorkflowError> {
        Ok(self.validator.validate_complete_data(doc_type, data)?)
    }

    /// Approval codes issued for a review, newest first
    pub fn codes_for_review(
        &self,
        review_id: ReviewId,
    ) -> Result<Vec<ApprovalCodeInfo>, WorkflowError> {
        Ok(self.codes.codes_for_review(review_id)?)
    }

    /// Drop expired, never-used credentials; returns (codes, tokens)
    pub fn cleanup_expired_credentials(&self) -> Result<(usize, usize), WorkflowError> {
        let codes = self.codes.cleanup_expired()?;
        let tokens = self.tokens.cleanup_expired()?;
        Ok((codes, tokens))
    }

    /// Data map handed to the renderer: review data plus the synthetic
    /// `__block_*__` variables
    fn render_data(&self, review: &Review) -> Result<DataMap, WorkflowError> {
        let schema = self.validator.load_schema(&review.doc_type)?;
        let mut data = review.data.clone();
        data.extend(generate_variables(&schema.blocks, &review.data));
        Ok(data)
    }

    /// Best-effort audit entry for a failed authorization whose code is
    /// known to the store (used or expired codes still identify a review)
    fn audit_authorize_failure(
        &self,
        approval_code: &str,
        origin: Option<&str>,
        error: &WorkflowError,
    ) {
        let Ok(Some(info)) = self.codes.code_info(approval_code) else {
            warn!("authorization failed: unknown approval code");
            return;
        };

        let lock = self.locks.for_review(info.review_id);
        let _guard = hold(&lock);

        match self.load(info.review_id) {
            Ok(mut review) => {
                let mut entry =
                    AuditLogEntry::new(AuditAction::AuthorizeFailed, &info.supervisor_id)
                        .with_details(format!("Authorization failed: {}", error));
                if let Some(origin) = origin {
                    entry = entry.with_origin(origin);
                }
                review.append_audit(entry);
                if let Err(err) = self.save(&review) {
                    warn!(%err, "failed to record authorization failure");
                }
            }
            Err(err) => warn!(%err, "failed to record authorization failure"),
        }
    }

    fn load(&self, review_id: ReviewId) -> Result<Review, WorkflowError> {
        self.store
            .load_review(review_id)
            .map_err(|e| WorkflowError::Store(e.to_string()))?
            .ok_or(WorkflowError::NotFound)
    }

    fn save(&self, review: &Review) -> Result<(), WorkflowError> {
        self.store
            .save_review(review)
            .map_err(|e| WorkflowError::Store(e.to_string()))
    }
}

fn state_error(review: &Review, error: StateError) -> WorkflowError {
    match error {
        StateError::NotEditable => WorkflowError::Forbidden(format!(
            "Review is {} and cannot be edited",
            review.status
        )),
        StateError::Conflict => {
            WorkflowError::Conflict(format!("Review is already {}", review.status))
        }
    }
}
