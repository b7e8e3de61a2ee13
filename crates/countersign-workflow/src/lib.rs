//! Countersign Workflow Orchestrator
//!
//! Composes the domain, gatekeeper, composer, credential, and store
//! layers into the operations exposed to the request-handling boundary:
//! create, edit, submit, request-approval-code, authorize, download, and
//! audit-view.
//!
//! The orchestrator is transport-agnostic. Handlers are synchronous,
//! request-per-call; every validate → mutate → persist cycle for a
//! review runs under that review's lock, so concurrent edits cannot
//! silently overwrite each other's snapshots.
//!
//! Services are explicit objects constructed once at process start and
//! passed by handle; there is no hidden global state and no ambient
//! environment access.

#![warn(missing_docs)]

mod config;
mod error;
mod locks;
mod workflow;

pub use config::WorkflowConfig;
pub use error::WorkflowError;
pub use workflow::{
    CreatedReview, IssuedCode, IssuedToken, ReviewData, ReviewInfo, ReviewStatusView,
    SubmitOutcome, UpdateOutcome, Workflow,
};
