//! Repository trait for user progress persistence

use async_trait::async_trait;

use crate::error::Result;

use super::entity::UserProgress;

/// Durable store of per-user progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Load a user's progress, if any has been recorded
    async fn load(&self, user_id: &str) -> Result<Option<UserProgress>>;

    /// Replace a user's progress in a single write
    async fn save(&self, progress: &UserProgress) -> Result<()>;

    /// Users who have started or completed a concept, sorted by id
    async fn learners_of(&self, concept_id: &str) -> Result<Vec<String>>;
}
