//! Review lifecycle status

use serde::{Deserialize, Serialize};

/// Status of a review in its lifecycle
///
/// Transitions are monotonic and never reverse:
/// - Draft: initial state, the author may edit whitelisted fields
/// - Submitted: frozen, awaiting supervisor authorization and download
/// - Downloaded: terminal, the rendered artifact has been retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    /// Editable initial state
    Draft,

    /// Frozen, awaiting download
    Submitted,

    /// Terminal state
    Downloaded,
}

impl ReviewStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Draft => "DRAFT",
            ReviewStatus::Submitted => "SUBMITTED",
            ReviewStatus::Downloaded => "DOWNLOADED",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(ReviewStatus::Draft),
            "SUBMITTED" => Some(ReviewStatus::Submitted),
            "DOWNLOADED" => Some(ReviewStatus::Downloaded),
            _ => None,
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid review status: {}", s))
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
