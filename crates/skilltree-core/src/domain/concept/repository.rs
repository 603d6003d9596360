//! Repository trait for concept graph persistence

use async_trait::async_trait;

use crate::error::Result;

use super::entity::Concept;

/// Durable store of concept nodes and their prerequisite edges
///
/// The store holds no cross-node invariants; acyclicity and difficulty
/// ordering are owned by the dependency graph engine.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Get a concept by id
    async fn get(&self, id: &str) -> Result<Option<Concept>>;

    /// List concepts, optionally restricted to one category
    ///
    /// Ordered by difficulty ascending, then id.
    async fn list(&self, category: Option<&str>) -> Result<Vec<Concept>>;

    /// Concepts whose title or description contains `query`, ignoring case
    ///
    /// Same ordering as [`GraphStore::list`].
    async fn search(&self, query: &str, category: Option<&str>) -> Result<Vec<Concept>>;

    /// Insert a concept unless its id already exists
    ///
    /// Returns the stored concept: the new one, or the existing one unmodified.
    async fn upsert(&self, concept: &Concept) -> Result<Concept>;

    /// Persist an in-place mutation of an existing concept as one write
    async fn save(&self, concept: &Concept) -> Result<()>;

    /// Distinct categories present in the store
    async fn categories(&self) -> Result<Vec<String>>;
}
