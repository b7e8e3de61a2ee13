//! Workflow configuration

use countersign_credentials::{DEFAULT_CODE_TTL_HOURS, DEFAULT_TOKEN_TTL_SECS};

/// Configuration for the workflow orchestrator
///
/// All tunables, including credential lifetimes, are loaded into this
/// one structure at startup and injected into the services that need
/// them.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Base URL used to build supervisor entry links
    pub base_url: String,

    /// Approval code lifetime in hours
    pub approval_code_ttl_hours: u64,

    /// Download token lifetime in seconds
    pub download_token_ttl_seconds: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            approval_code_ttl_hours: DEFAULT_CODE_TTL_HOURS,
            download_token_ttl_seconds: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}
