//! Skilltree Core Library
//!
//! This crate provides the core functionality for Skilltree, including:
//! - Concept graph with cycle-safe prerequisite edges
//! - Category validation and difficulty repair
//! - Learning paths and dependency chains
//! - Candidate proposal intake (LLM extraction + prerequisite rules)
//! - Per-user progress projection
//! - Storage (SQLite)

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod llm;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, GraphConfig, RepairMode};
    pub use crate::domain::concept::{Concept, GraphStore, PrerequisiteEdge, slugify};
    pub use crate::domain::graph::{DependencyGraphEngine, ValidationReport};
    pub use crate::domain::progress::{ProgressSnapshot, ProgressStore, UserProgressProjector};
    pub use crate::domain::proposal::{
        ConceptIngestService, PrerequisiteRuleSet, ProposalBatch, RelationshipProposalResolver,
    };
    pub use crate::error::{Error, Result};
    pub use crate::storage::Database;
}

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod error_tests;
