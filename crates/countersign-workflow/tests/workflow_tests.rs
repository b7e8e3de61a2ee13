//! Integration tests for the workflow orchestrator
//!
//! Exercises the full lifecycle end-to-end against the SQLite store and
//! a stub renderer: create → gated edits → submit → approval code →
//! authorize → download, plus the failure paths around credentials and
//! rendering.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use countersign_credentials::SupervisorDirectory;
use countersign_domain::traits::{RenderedArtifact, Renderer, ReviewFilter};
use countersign_domain::{AuditAction, DataMap, DocSchema, ReviewId, ReviewStatus};
use countersign_gatekeeper::SchemaValidator;
use countersign_store::SqliteStore;
use countersign_workflow::{Workflow, WorkflowConfig, WorkflowError};
use serde_json::{json, Value};

const DOC_TYPE: &str = "engagement_letter";
const PASSWORD: &str = "s3cret";

struct StubRenderer;

impl Renderer for StubRenderer {
    type Error = String;

    fn render(
        &self,
        doc_type: &str,
        _data: &DataMap,
        review_id: ReviewId,
    ) -> Result<RenderedArtifact, Self::Error> {
        Ok(RenderedArtifact {
            path: PathBuf::from(format!("/tmp/{}.docx", review_id)),
            filename: format!("{}.docx", doc_type),
        })
    }
}

/// Fails the first render, succeeds afterwards
struct FlakyRenderer {
    fail_next: AtomicBool,
}

impl FlakyRenderer {
    fn new() -> Self {
        Self {
            fail_next: AtomicBool::new(true),
        }
    }
}

impl Renderer for FlakyRenderer {
    type Error = String;

    fn render(
        &self,
        doc_type: &str,
        data: &DataMap,
        review_id: ReviewId,
    ) -> Result<RenderedArtifact, Self::Error> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err("template engine unavailable".to_string());
        }
        StubRenderer.render(doc_type, data, review_id)
    }
}

/// Records the data map it was handed
struct CapturingRenderer {
    seen: Arc<Mutex<Option<DataMap>>>,
}

impl Renderer for CapturingRenderer {
    type Error = String;

    fn render(
        &self,
        doc_type: &str,
        data: &DataMap,
        review_id: ReviewId,
    ) -> Result<RenderedArtifact, Self::Error> {
        *self.seen.lock().unwrap() = Some(data.clone());
        StubRenderer.render(doc_type, data, review_id)
    }
}

fn schema() -> DocSchema {
    serde_json::from_str(
        r#"{
            "fields": {
                "Name": { "type": "string", "editable": true, "required": true },
                "LockedField": { "type": "string" }
            },
            "blocks": {
                "scope": {
                    "inner_template": "Scope covers {{ Name }}.",
                    "append_mode": "newline",
                    "custom_type": "text",
                    "max_length": 200
                }
            }
        }"#,
    )
    .unwrap()
}

fn directory() -> Arc<SupervisorDirectory> {
    Arc::new(
        SupervisorDirectory::from_toml_str(
            r#"
            [supervisors.maria]
            name = "Maria Jose"
            email = "maria@example.com"
            password = "s3cret"
            "#,
        )
        .unwrap(),
    )
}

fn workflow_with<R: Renderer>(renderer: R) -> Workflow<SqliteStore, R>
where
    R::Error: std::fmt::Display,
{
    let store = Arc::new(SqliteStore::new(":memory:").unwrap());
    let validator = SchemaValidator::new("unused");
    validator.register_schema(DOC_TYPE, schema());

    Workflow::new(
        store,
        validator,
        directory(),
        renderer,
        WorkflowConfig::default(),
    )
}

fn data(pairs: &[(&str, Value)]) -> DataMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn created<R: Renderer<Error = String>>(workflow: &Workflow<SqliteStore, R>) -> ReviewId {
    workflow
        .create_review(DOC_TYPE, data(&[("Name", json!("Acme"))]), "employee-7", None)
        .unwrap()
        .review_id
}

#[test]
fn test_full_lifecycle_scenario() {
    let workflow = workflow_with(StubRenderer);

    // Create: status DRAFT, manager link present
    let created = workflow
        .create_review(
            DOC_TYPE,
            data(&[("Name", json!("Acme"))]),
            "employee-7",
            Some("10.0.0.3"),
        )
        .unwrap();
    assert_eq!(created.status, ReviewStatus::Draft);
    assert!(created
        .manager_link
        .ends_with(&format!("/manager/reviews/{}", created.review_id)));
    let review_id = created.review_id;

    // Update: one authorized field applied, one rejected and logged
    let outcome = workflow
        .update_data(
            review_id,
            &data(&[("Name", json!("Acme2")), ("LockedField", json!("hack"))]),
            "employee-7",
            None,
        )
        .unwrap();
    assert_eq!(outcome.updated_fields, vec!["Name"]);
    assert_eq!(outcome.rejected_fields, vec!["LockedField"]);
    assert!(outcome.errors.is_empty());

    let view = workflow.get_data(review_id).unwrap();
    assert_eq!(view.data["Name"], json!("Acme2"));
    assert!(!view.data.contains_key("LockedField"));
    assert!(view.editable_fields.contains(&"scope_custom".to_string()));

    // Submit freezes the review
    let submitted = workflow.submit(review_id, "employee-7", None).unwrap();
    assert_eq!(submitted.status, ReviewStatus::Submitted);

    let frozen = workflow.get_data(review_id).unwrap().data;
    let err = workflow
        .update_data(review_id, &data(&[("Name", json!("late"))]), "employee-7", None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
    assert_eq!(workflow.get_data(review_id).unwrap().data, frozen);

    // Approval code: 8 chars, uppercase + digits, bound supervisor named
    let issued = workflow
        .request_approval_code(review_id, "maria", None)
        .unwrap();
    assert_eq!(issued.code.len(), 8);
    assert!(issued
        .code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(issued.supervisor_name, "Maria Jose");

    // Wrong password fails and is audited; the code survives
    let err = workflow.authorize(&issued.code, "wrong", None).unwrap_err();
    assert!(matches!(err, WorkflowError::WrongPassword));

    // Correct password issues a token and consumes the code
    let token = workflow.authorize(&issued.code, PASSWORD, None).unwrap();
    assert_eq!(token.expires_in, 300);
    let err = workflow.authorize(&issued.code, PASSWORD, None).unwrap_err();
    assert!(matches!(err, WorkflowError::CodeAlreadyUsed));

    // Download finalizes the review and consumes the token
    let artifact = workflow
        .download(
            review_id,
            &token.download_token,
            "maria",
            Some("10.0.0.9"),
            Some("curl/8.0"),
        )
        .unwrap();
    assert_eq!(artifact.filename, format!("{}.docx", DOC_TYPE));
    assert_eq!(
        workflow.review_info(review_id).unwrap().status,
        ReviewStatus::Downloaded
    );

    let err = workflow
        .download(review_id, &token.download_token, "maria", None, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidToken));
}

#[test]
fn test_audit_trail_records_each_step() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);

    workflow
        .update_data(
            review_id,
            &data(&[("Name", json!("Acme2")), ("LockedField", json!("hack"))]),
            "employee-7",
            None,
        )
        .unwrap();
    workflow.submit(review_id, "employee-7", None).unwrap();
    let issued = workflow
        .request_approval_code(review_id, "maria", None)
        .unwrap();
    let _ = workflow.authorize(&issued.code, "wrong", None);
    let token = workflow.authorize(&issued.code, PASSWORD, None).unwrap();

    // The audit view does not consume the token
    let entries = workflow
        .audit_log(review_id, &token.download_token)
        .unwrap();
    let actions: Vec<_> = entries.iter().map(|e| e.action).collect();
    // Unauthorized attempts are logged before the accepted updates
    assert_eq!(
        actions,
        vec![
            AuditAction::Create,
            AuditAction::UnauthorizedFieldAttempt,
            AuditAction::FieldUpdate,
            AuditAction::Submit,
            AuditAction::ApprovalCodeIssued,
            AuditAction::AuthorizeFailed,
            AuditAction::AuthorizeSuccess,
        ]
    );

    workflow
        .download(review_id, &token.download_token, "maria", None, None)
        .unwrap();

    // The consumed token still authorizes the audit view
    let entries = workflow
        .audit_log(review_id, &token.download_token)
        .unwrap();
    assert_eq!(entries.last().unwrap().action, AuditAction::Download);
}

#[test]
fn test_audit_log_requires_bound_token() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);

    let err = workflow.audit_log(review_id, "no-such-token").unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidToken));
}

#[test]
fn test_create_unknown_doc_type() {
    let workflow = workflow_with(StubRenderer);
    let err = workflow
        .create_review("mystery", DataMap::new(), "employee-7", None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownDocType(_)));
}

#[test]
fn test_operations_on_missing_review() {
    let workflow = workflow_with(StubRenderer);
    let ghost = ReviewId::new();

    assert!(matches!(
        workflow.get_data(ghost),
        Err(WorkflowError::NotFound)
    ));
    assert!(matches!(
        workflow.submit(ghost, "employee-7", None),
        Err(WorkflowError::NotFound)
    ));
    assert!(matches!(
        workflow.download(ghost, "token", "maria", None, None),
        Err(WorkflowError::NotFound)
    ));
}

#[test]
fn test_submit_twice_conflicts() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);

    workflow.submit(review_id, "employee-7", None).unwrap();
    let err = workflow.submit(review_id, "employee-7", None).unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));
}

#[test]
fn test_approval_code_requires_submitted_review() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);

    let err = workflow
        .request_approval_code(review_id, "maria", None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[test]
fn test_approval_code_unknown_supervisor() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);
    workflow.submit(review_id, "employee-7", None).unwrap();

    let err = workflow
        .request_approval_code(review_id, "nobody", None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownSupervisor(_)));
}

#[test]
fn test_authorize_unknown_code() {
    let workflow = workflow_with(StubRenderer);
    let err = workflow.authorize("NOPE0000", PASSWORD, None).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidCode));
}

#[test]
fn test_download_requires_valid_token_for_review() {
    let workflow = workflow_with(StubRenderer);
    let first = created(&workflow);
    let second = created(&workflow);
    workflow.submit(first, "employee-7", None).unwrap();
    workflow.submit(second, "employee-7", None).unwrap();

    let issued = workflow.request_approval_code(first, "maria", None).unwrap();
    let token = workflow.authorize(&issued.code, PASSWORD, None).unwrap();

    // Token bound to the first review cannot download the second
    let err = workflow
        .download(second, &token.download_token, "maria", None, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidToken));

    // And the failed attempt did not consume it
    workflow
        .download(first, &token.download_token, "maria", None, None)
        .unwrap();
}

#[test]
fn test_download_of_draft_review_is_forbidden() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);

    let err = workflow
        .download(review_id, "whatever", "maria", None, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[test]
fn test_render_failure_restores_token_for_retry() {
    let workflow = workflow_with(FlakyRenderer::new());
    let review_id = created(&workflow);
    workflow.submit(review_id, "employee-7", None).unwrap();
    let issued = workflow
        .request_approval_code(review_id, "maria", None)
        .unwrap();
    let token = workflow.authorize(&issued.code, PASSWORD, None).unwrap();

    // First attempt: renderer fails, review stays submitted
    let err = workflow
        .download(review_id, &token.download_token, "maria", None, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Render(_)));
    let info = workflow.review_info(review_id).unwrap();
    assert_eq!(info.status, ReviewStatus::Submitted);

    // The failure is on the audit trail
    let entries = workflow
        .audit_log(review_id, &token.download_token)
        .unwrap();
    assert_eq!(entries.last().unwrap().action, AuditAction::DownloadFailed);

    // Retry with the same token succeeds exactly once
    workflow
        .download(review_id, &token.download_token, "maria", None, None)
        .unwrap();
    assert_eq!(
        workflow.review_info(review_id).unwrap().status,
        ReviewStatus::Downloaded
    );
    let err = workflow
        .download(review_id, &token.download_token, "maria", None, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidToken));
}

#[test]
fn test_renderer_receives_block_variables() {
    let seen = Arc::new(Mutex::new(None));
    let workflow = workflow_with(CapturingRenderer {
        seen: Arc::clone(&seen),
    });

    let review_id = created(&workflow);
    workflow
        .update_data(
            review_id,
            &data(&[("scope_custom", json!("Plus the annex."))]),
            "employee-7",
            None,
        )
        .unwrap();
    workflow.submit(review_id, "employee-7", None).unwrap();
    let issued = workflow
        .request_approval_code(review_id, "maria", None)
        .unwrap();
    let token = workflow.authorize(&issued.code, PASSWORD, None).unwrap();
    workflow
        .download(review_id, &token.download_token, "maria", None, None)
        .unwrap();

    let seen = seen.lock().unwrap();
    let rendered = seen.as_ref().unwrap();
    assert_eq!(
        rendered["__block_scope__"],
        json!("Scope covers Acme.\nPlus the annex.")
    );
    // Original fields travel alongside the synthetic variables
    assert_eq!(rendered["Name"], json!("Acme"));
}

#[test]
fn test_status_and_info_views() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);

    let status = workflow.review_status(review_id).unwrap();
    assert_eq!(status.status, ReviewStatus::Draft);
    assert!(status.can_edit && status.can_submit);
    assert!(status.manager_link.is_none());

    workflow.submit(review_id, "employee-7", None).unwrap();

    let status = workflow.review_status(review_id).unwrap();
    assert!(!status.can_edit);
    assert!(status.submitted_at.is_some());
    assert!(status.manager_link.is_some());

    let info = workflow.review_info(review_id).unwrap();
    assert_eq!(info.doc_type, DOC_TYPE);
    assert!(info.can_download);
}

#[test]
fn test_list_reviews_by_creator() {
    let workflow = workflow_with(StubRenderer);
    workflow
        .create_review(DOC_TYPE, data(&[("Name", json!("A"))]), "alice", None)
        .unwrap();
    workflow
        .create_review(DOC_TYPE, data(&[("Name", json!("B"))]), "bob", None)
        .unwrap();

    let by_alice = workflow
        .list_reviews(&ReviewFilter {
            status: None,
            created_by: Some("alice".to_string()),
        })
        .unwrap();
    assert_eq!(by_alice.len(), 1);
    assert_eq!(by_alice[0].created_by, "alice");
}

#[test]
fn test_validate_initial_data_reports_missing_required() {
    let workflow = workflow_with(StubRenderer);

    let result = workflow
        .validate_initial_data(DOC_TYPE, &DataMap::new())
        .unwrap();
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.field == "Name"));

    let result = workflow
        .validate_initial_data(DOC_TYPE, &data(&[("Name", json!("Acme"))]))
        .unwrap();
    assert!(result.is_valid);
}

#[test]
fn test_codes_for_review_listing() {
    let workflow = workflow_with(StubRenderer);
    let review_id = created(&workflow);
    workflow.submit(review_id, "employee-7", None).unwrap();

    workflow
        .request_approval_code(review_id, "maria", None)
        .unwrap();
    workflow
        .request_approval_code(review_id, "maria", None)
        .unwrap();

    let codes = workflow.codes_for_review(review_id).unwrap();
    assert_eq!(codes.len(), 2);
    assert!(codes.iter().all(|c| c.is_valid));
    assert!(codes.iter().all(|c| c.supervisor_name == "Maria Jose"));
}

#[test]
fn test_supervisor_listing_is_display_safe() {
    let workflow = workflow_with(StubRenderer);
    let supervisors = workflow.supervisors();
    assert_eq!(supervisors.len(), 1);
    assert_eq!(supervisors[0].id, "maria");
    assert_eq!(supervisors[0].name, "Maria Jose");
}
