//! Dependency graph engine
//!
//! Enforces the structural invariants of the concept graph and computes
//! derived views over it.
//!
//! # Architecture
//!
//! - `engine`: cycle-checked edge insertion, dependency chains, difficulty
//!   repair and topological learning paths
//! - `locks`: per-key async locks and store-call deadlines
//! - `validation`: the report produced by category validation
//!
//! # Example
//!
//! ```ignore
//! use skilltree_core::domain::graph::DependencyGraphEngine;
//!
//! let engine = DependencyGraphEngine::new(store, config.graph.clone());
//! engine.add_prerequisite_edge("derivatives", "limits", Some("rates of change")).await?;
//! let path = engine.topological_learning_path("calculus").await?;
//! ```

mod engine;
mod locks;
mod validation;

pub use engine::{ConceptNode, DependencyGraphEngine, EdgeOutcome, PrerequisiteRef};
pub use locks::{KeyGuard, KeyedLocks, acquire_within, store_call};
pub use validation::{
    FixKind, IssueKind, ValidationFix, ValidationIssue, ValidationReport, ValidationStatus,
};
