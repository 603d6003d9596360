//! Error types for Skilltree

use thiserror::Error;

/// Result type alias using Skilltree's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Skilltree error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Concept '{0}' not found. Run `skilltree concept list` to see all concepts.")]
    ConceptNotFound(String),

    #[error("No progress recorded for user '{0}'.")]
    UserNotFound(String),

    // Graph integrity errors (E100-E199)
    #[error("Adding prerequisite '{prerequisite}' to '{concept}' would create a cycle.")]
    CycleDetected {
        concept: String,
        prerequisite: String,
    },

    #[error("Could not resolve '{0}' to a concept in this batch.")]
    UnresolvedReference(String),

    #[error("Snapshot references unknown concepts: {}", .0.join(", "))]
    UnknownConceptReference(Vec<String>),

    // Upstream errors (E200-E299)
    #[error("Extraction service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Extraction returned unusable data: {0}")]
    ExtractionFailed(String),

    // Concurrency errors (E300-E399)
    #[error("Lock timeout: '{0}' is being modified by another request. Try again later.")]
    LockTimeout(String),

    #[error("Store operation '{0}' timed out.")]
    StoreTimeout(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a cycle rejection on the edge `prerequisite -> concept`
    pub fn cycle(concept: impl Into<String>, prerequisite: impl Into<String>) -> Self {
        Self::CycleDetected {
            concept: concept.into(),
            prerequisite: prerequisite.into(),
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConceptNotFound(_) => "E001",
            Self::UserNotFound(_) => "E002",
            Self::CycleDetected { .. } => "E100",
            Self::UnresolvedReference(_) => "E101",
            Self::UnknownConceptReference(_) => "E102",
            Self::UpstreamUnavailable(_) => "E200",
            Self::ExtractionFailed(_) => "E201",
            Self::LockTimeout(_) => "E300",
            Self::StoreTimeout(_) => "E301",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Serialization(_) | Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ConceptNotFound(_) => Some("skilltree concept list".to_string()),
            Self::CycleDetected { concept, .. } => Some(format!("skilltree chain {}", concept)),
            Self::UpstreamUnavailable(_) => {
                Some("Set SKILLTREE_API_KEY or OPENROUTER_API_KEY".to_string())
            }
            Self::ConfigError(_) => Some("skilltree config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error reflects a graph invariant rather than an
    /// infrastructure failure
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected { .. } | Self::UnknownConceptReference(_)
        )
    }
}
