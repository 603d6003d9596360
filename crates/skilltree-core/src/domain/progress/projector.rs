//! Per-user projection of the concept graph
//!
//! Combines a user's progress with the current graph to answer which
//! concepts are learnable now and which are still blocked. The projector
//! never writes to the graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::domain::concept::{Concept, GraphStore};
use crate::domain::graph::{KeyedLocks, store_call};
use crate::error::{Error, Result};

use super::entity::{ProgressSnapshot, UserProgress};
use super::repository::ProgressStore;

/// Learning statistics for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStatistics {
    pub user_id: String,
    pub total_concepts: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub percent_complete: u32,
    pub categories: BTreeMap<String, CategoryStatistics>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStatistics {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
}

pub struct UserProgressProjector<G: GraphStore, P: ProgressStore> {
    graph: Arc<G>,
    progress: Arc<P>,
    config: GraphConfig,
    user_locks: KeyedLocks,
}

impl<G: GraphStore, P: ProgressStore> UserProgressProjector<G, P> {
    pub fn new(graph: Arc<G>, progress: Arc<P>, config: GraphConfig) -> Self {
        Self {
            graph,
            progress,
            config,
            user_locks: KeyedLocks::new(),
        }
    }

    async fn concept_exists(&self, concept_id: &str) -> Result<bool> {
        let found = store_call("get", self.config.store_timeout(), self.graph.get(concept_id)).await?;
        Ok(found.is_some())
    }

    async fn require_concept(&self, concept_id: &str) -> Result<()> {
        if self.concept_exists(concept_id).await? {
            Ok(())
        } else {
            Err(Error::ConceptNotFound(concept_id.to_string()))
        }
    }

    async fn concepts(&self, category: Option<&str>) -> Result<Vec<Concept>> {
        store_call("list", self.config.store_timeout(), self.graph.list(category)).await
    }

    async fn load(&self, user_id: &str) -> Result<Option<UserProgress>> {
        store_call("load_progress", self.config.store_timeout(), self.progress.load(user_id)).await
    }

    async fn store(&self, progress: &UserProgress) -> Result<()> {
        store_call("save_progress", self.config.store_timeout(), self.progress.save(progress)).await
    }

    /// A user's progress; empty if nothing has been recorded yet
    pub async fn progress(&self, user_id: &str) -> Result<UserProgress> {
        Ok(self
            .load(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::new(user_id)))
    }

    /// Concepts not yet completed whose prerequisites are all completed
    pub async fn available(&self, user_id: &str, category: Option<&str>) -> Result<Vec<Concept>> {
        let (available, _) = self.partition(user_id, category).await?;
        Ok(available)
    }

    /// Concepts not yet completed with at least one prerequisite outstanding
    pub async fn blocked(&self, user_id: &str, category: Option<&str>) -> Result<Vec<Concept>> {
        let (_, blocked) = self.partition(user_id, category).await?;
        Ok(blocked)
    }

    /// Split a category's non-completed concepts into (available, blocked)
    pub async fn partition(
        &self,
        user_id: &str,
        category: Option<&str>,
    ) -> Result<(Vec<Concept>, Vec<Concept>)> {
        let progress = self.progress(user_id).await?;
        let concepts = self.concepts(category).await?;

        let (available, blocked): (Vec<Concept>, Vec<Concept>) = concepts
            .into_iter()
            .filter(|c| !progress.is_completed(&c.id))
            .partition(|c| c.prerequisite_ids.iter().all(|p| progress.is_completed(p)));

        debug!(
            user_id = %user_id,
            available = available.len(),
            blocked = blocked.len(),
            "Projected user progress"
        );
        Ok((available, blocked))
    }

    /// Record a concept as completed. Idempotent.
    pub async fn mark_completed(&self, user_id: &str, concept_id: &str) -> Result<UserProgress> {
        self.require_concept(concept_id).await?;
        let _user = self
            .user_locks
            .acquire(user_id, self.config.lock_timeout())
            .await?;

        let mut progress = self.progress(user_id).await?;
        if progress.complete(concept_id) {
            self.store(&progress).await?;
            info!(user_id = %user_id, concept_id = %concept_id, "Concept completed");
        }
        Ok(progress)
    }

    /// Record a concept as in progress, unless it is already completed
    pub async fn mark_started(&self, user_id: &str, concept_id: &str) -> Result<UserProgress> {
        self.require_concept(concept_id).await?;
        let _user = self
            .user_locks
            .acquire(user_id, self.config.lock_timeout())
            .await?;

        let mut progress = self.progress(user_id).await?;
        if progress.start(concept_id) {
            self.store(&progress).await?;
            info!(user_id = %user_id, concept_id = %concept_id, "Concept started");
        }
        Ok(progress)
    }

    /// Forget a user's progress on one concept. Returns whether anything changed.
    pub async fn reset_concept(&self, user_id: &str, concept_id: &str) -> Result<bool> {
        self.require_concept(concept_id).await?;
        let _user = self
            .user_locks
            .acquire(user_id, self.config.lock_timeout())
            .await?;

        let Some(mut progress) = self.load(user_id).await? else {
            return Ok(false);
        };
        let changed = progress.reset(concept_id);
        if changed {
            self.store(&progress).await?;
            info!(user_id = %user_id, concept_id = %concept_id, "Concept progress reset");
        }
        Ok(changed)
    }

    /// Record progress on a concept as a percentage from 0 to 100
    pub async fn record_percent(
        &self,
        user_id: &str,
        concept_id: &str,
        percent: u8,
    ) -> Result<UserProgress> {
        if percent > 100 {
            return Err(Error::InvalidInput(format!(
                "Progress must be between 0 and 100, got {}",
                percent
            )));
        }
        self.require_concept(concept_id).await?;
        let _user = self
            .user_locks
            .acquire(user_id, self.config.lock_timeout())
            .await?;

        let mut progress = self.progress(user_id).await?;
        if progress.record_percent(concept_id, percent) {
            self.store(&progress).await?;
            info!(user_id = %user_id, concept_id = %concept_id, percent, "Progress recorded");
        }
        Ok(progress)
    }

    /// Users who have started or completed a concept
    pub async fn learners(&self, concept_id: &str) -> Result<Vec<String>> {
        self.require_concept(concept_id).await?;
        store_call(
            "learners",
            self.config.store_timeout(),
            self.progress.learners_of(concept_id),
        )
        .await
    }

    /// Export a user's progress
    pub async fn export_snapshot(&self, user_id: &str) -> Result<ProgressSnapshot> {
        let progress = self
            .load(user_id)
            .await?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        Ok(ProgressSnapshot::from(&progress))
    }

    /// Replace a user's progress with a snapshot, all or nothing
    ///
    /// Every referenced id must exist and the two sets must be disjoint.
    /// The snapshot's own `user_id` is ignored in favour of `user_id`.
    pub async fn import_snapshot(
        &self,
        user_id: &str,
        snapshot: ProgressSnapshot,
    ) -> Result<UserProgress> {
        let overlap = snapshot.overlapping_ids();
        if !overlap.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Concepts cannot be both completed and in progress: {}",
                overlap.join(", ")
            )));
        }

        let _user = self
            .user_locks
            .acquire(user_id, self.config.lock_timeout())
            .await?;

        let progress = snapshot.into_progress(user_id);

        let mut unknown = Vec::new();
        for id in progress.referenced_ids() {
            if !self.concept_exists(id).await? {
                unknown.push(id.clone());
            }
        }
        if !unknown.is_empty() {
            warn!(user_id = %user_id, unknown = unknown.len(), "Rejected progress import");
            return Err(Error::UnknownConceptReference(unknown));
        }

        self.store(&progress).await?;
        info!(
            user_id = %user_id,
            completed = progress.completed.len(),
            in_progress = progress.in_progress.len(),
            "Progress imported"
        );
        Ok(progress)
    }

    /// Totals across the whole graph, broken down by category
    pub async fn statistics(&self, user_id: &str) -> Result<ProgressStatistics> {
        let progress = self.progress(user_id).await?;
        let concepts = self.concepts(None).await?;

        let mut categories: BTreeMap<String, CategoryStatistics> = BTreeMap::new();
        let mut completed = 0;
        let mut in_progress = 0;

        for concept in &concepts {
            let stats = categories.entry(concept.category.clone()).or_default();
            stats.total += 1;
            if progress.is_completed(&concept.id) {
                stats.completed += 1;
                completed += 1;
            } else if progress.is_in_progress(&concept.id) {
                stats.in_progress += 1;
                in_progress += 1;
            }
        }

        let total = concepts.len();
        let percent_complete = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        Ok(ProgressStatistics {
            user_id: user_id.to_string(),
            total_concepts: total,
            completed,
            in_progress,
            not_started: total - completed - in_progress,
            percent_complete,
            categories,
        })
    }
}
