//! Merging candidate proposals into the concept graph
//!
//! A batch is applied in three steps: candidates are committed as concepts
//! (fundamentals first), then explicit relationships are applied as edges
//! through the engine, and finally everything is summarised in a
//! [`ProposalReport`]. Per-item failures land in the report; they never
//! abort the batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::concept::{Concept, GraphStore, PrerequisiteEdge, slugify};
use crate::domain::graph::DependencyGraphEngine;
use crate::error::{Error, Result};

use super::candidate::{CandidateConcept, CandidateRelationship, ProposalBatch};
use super::rules::PrerequisiteRuleSet;

/// Normalized title → concept id, built once per batch
///
/// Lookups ignore case and surrounding/repeated whitespace. A title that
/// slugifies to an indexed id also resolves.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    by_title: HashMap<String, String>,
    ids: HashSet<String>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(title: &str) -> String {
        title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    pub fn insert(&mut self, title: &str, id: &str) {
        self.by_title
            .entry(Self::normalize(title))
            .or_insert_with(|| id.to_string());
        self.ids.insert(id.to_string());
    }

    pub fn resolve(&self, title: &str) -> Option<&str> {
        if let Some(id) = self.by_title.get(&Self::normalize(title)) {
            return Some(id.as_str());
        }
        let slug = slugify(title);
        self.ids.get(&slug).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedConcept {
    pub concept_id: String,
    pub title: String,
    pub difficulty: u32,
    pub prerequisites: Vec<String>,
}

impl From<&Concept> for CreatedConcept {
    fn from(concept: &Concept) -> Self {
        Self {
            concept_id: concept.id.clone(),
            title: concept.title.clone(),
            difficulty: concept.difficulty,
            prerequisites: concept.prerequisite_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotCommittedReason {
    /// A concept with this id was already in the graph
    Exists,
    /// Another candidate in the same batch produced this id
    Duplicate,
    /// The title has no characters usable in an id
    EmptyId,
    /// The engine refused the concept
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotCommitted {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<String>,
    pub reason: NotCommittedReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipOutcome {
    Applied,
    AlreadyPresent,
    CycleRejected,
    Unresolved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipResult {
    pub concept: String,
    pub prerequisite: String,
    pub outcome: RelationshipOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything that happened while applying one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalReport {
    pub category: String,
    pub created: Vec<CreatedConcept>,
    /// Edges that did not exist before this batch
    pub established: Vec<PrerequisiteEdge>,
    pub not_committed: Vec<NotCommitted>,
    pub relationship_results: Vec<RelationshipResult>,
    /// Titles inserted by prerequisite rules
    pub interpolated: Vec<String>,
    pub cancelled: bool,
}

impl ProposalReport {
    pub fn count(&self, outcome: RelationshipOutcome) -> usize {
        self.relationship_results
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }
}

pub struct RelationshipProposalResolver<S: GraphStore> {
    engine: Arc<DependencyGraphEngine<S>>,
    rules: Option<Arc<PrerequisiteRuleSet>>,
}

impl<S: GraphStore> RelationshipProposalResolver<S> {
    pub fn new(engine: Arc<DependencyGraphEngine<S>>) -> Self {
        Self {
            engine,
            rules: None,
        }
    }

    /// Interpolate missing prerequisites with `rules` before committing
    pub fn with_rules(mut self, rules: Arc<PrerequisiteRuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn engine(&self) -> &Arc<DependencyGraphEngine<S>> {
        &self.engine
    }

    /// Apply a batch until done or cancelled
    pub async fn apply(
        &self,
        batch: ProposalBatch,
        cancel: &CancellationToken,
    ) -> Result<ProposalReport> {
        let ProposalBatch {
            category,
            mut concepts,
            mut relationships,
        } = batch;

        let mut report = ProposalReport {
            category: category.clone(),
            ..Default::default()
        };

        if let Some(rules) = &self.rules {
            report.interpolated = rules.interpolate(&mut concepts, &mut relationships);
        }

        let mut index = TitleIndex::new();
        let mut seen_ids = HashSet::new();

        let (fundamentals, dependents): (Vec<_>, Vec<_>) =
            concepts.into_iter().partition(|c| c.is_fundamental);

        for candidate in fundamentals.iter().chain(dependents.iter()) {
            if cancel.is_cancelled() {
                return Ok(self.finish_cancelled(report));
            }
            self.commit_candidate(
                candidate,
                &category,
                &relationships,
                &mut index,
                &mut seen_ids,
                &mut report,
            )
            .await;
        }

        for relationship in &relationships {
            if cancel.is_cancelled() {
                return Ok(self.finish_cancelled(report));
            }
            let result = self.apply_relationship(relationship, &index, &mut report).await;
            report.relationship_results.push(result);
        }

        info!(
            category = %report.category,
            created = report.created.len(),
            established = report.established.len(),
            not_committed = report.not_committed.len(),
            cycle_rejected = report.count(RelationshipOutcome::CycleRejected),
            unresolved = report.count(RelationshipOutcome::Unresolved),
            interpolated = report.interpolated.len(),
            "Proposal batch applied"
        );
        Ok(report)
    }

    fn finish_cancelled(&self, mut report: ProposalReport) -> ProposalReport {
        report.cancelled = true;
        warn!(
            category = %report.category,
            created = report.created.len(),
            relationships = report.relationship_results.len(),
            "Proposal batch cancelled"
        );
        report
    }

    async fn commit_candidate(
        &self,
        candidate: &CandidateConcept,
        category: &str,
        relationships: &[CandidateRelationship],
        index: &mut TitleIndex,
        seen_ids: &mut HashSet<String>,
        report: &mut ProposalReport,
    ) {
        let title = candidate.title.trim();
        let id = slugify(title);

        if id.is_empty() {
            warn!(title = %title, "Candidate title produces no usable id");
            report.not_committed.push(NotCommitted {
                title: title.to_string(),
                concept_id: None,
                reason: NotCommittedReason::EmptyId,
                detail: None,
            });
            return;
        }
        if !seen_ids.insert(id.clone()) {
            report.not_committed.push(NotCommitted {
                title: title.to_string(),
                concept_id: Some(id),
                reason: NotCommittedReason::Duplicate,
                detail: None,
            });
            return;
        }

        let prerequisites = if candidate.is_fundamental {
            Vec::new()
        } else {
            initial_prerequisites(title, &id, relationships, index)
        };

        let mut concept = Concept::new(title, category)
            .with_id(&id)
            .with_description(candidate.description.trim())
            .with_difficulty(candidate.difficulty_level.unwrap_or(1));
        for (prerequisite_id, reason) in prerequisites {
            concept.add_prerequisite(&prerequisite_id, reason);
        }

        match self.engine.create_or_get(concept).await {
            Ok((stored, true)) => {
                index.insert(title, &stored.id);
                report.established.extend(stored.edges());
                report.created.push(CreatedConcept::from(&stored));
            }
            Ok((stored, false)) => {
                index.insert(title, &stored.id);
                report.not_committed.push(NotCommitted {
                    title: title.to_string(),
                    concept_id: Some(stored.id),
                    reason: NotCommittedReason::Exists,
                    detail: None,
                });
            }
            Err(e) => {
                warn!(title = %title, error = %e, "Candidate rejected");
                report.not_committed.push(NotCommitted {
                    title: title.to_string(),
                    concept_id: Some(id),
                    reason: NotCommittedReason::Rejected,
                    detail: Some(e.to_string()),
                });
            }
        }
    }

    async fn apply_relationship(
        &self,
        relationship: &CandidateRelationship,
        index: &TitleIndex,
        report: &mut ProposalReport,
    ) -> RelationshipResult {
        let mut result = RelationshipResult {
            concept: relationship.concept.clone(),
            prerequisite: relationship.prerequisite.clone(),
            outcome: RelationshipOutcome::Applied,
            detail: None,
        };

        let resolved = index
            .resolve(&relationship.concept)
            .ok_or_else(|| Error::UnresolvedReference(relationship.concept.clone()))
            .and_then(|concept_id| {
                index
                    .resolve(&relationship.prerequisite)
                    .map(|prerequisite_id| (concept_id, prerequisite_id))
                    .ok_or_else(|| Error::UnresolvedReference(relationship.prerequisite.clone()))
            });

        let (concept_id, prerequisite_id) = match resolved {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Relationship skipped");
                result.outcome = RelationshipOutcome::Unresolved;
                result.detail = Some(e.to_string());
                return result;
            }
        };

        let reason = Some(relationship.reason.trim()).filter(|r| !r.is_empty());
        match self
            .engine
            .add_prerequisite_edge(concept_id, prerequisite_id, reason)
            .await
        {
            Ok(outcome) if outcome.applied => {
                report.established.push(outcome.edge);
            }
            Ok(_) => {
                result.outcome = RelationshipOutcome::AlreadyPresent;
            }
            Err(e @ Error::CycleDetected { .. }) => {
                result.outcome = RelationshipOutcome::CycleRejected;
                result.detail = Some(e.to_string());
            }
            Err(e) => {
                warn!(concept_id = %concept_id, prerequisite_id = %prerequisite_id, error = %e, "Relationship failed");
                result.outcome = RelationshipOutcome::Failed;
                result.detail = Some(e.to_string());
            }
        }
        result
    }
}

/// Prerequisites a dependent candidate receives at creation: those named by
/// relationships on its title that already resolve in the batch index
fn initial_prerequisites<'a>(
    title: &str,
    id: &str,
    relationships: &'a [CandidateRelationship],
    index: &'a TitleIndex,
) -> Vec<(String, Option<&'a str>)> {
    let normalized = TitleIndex::normalize(title);
    relationships
        .iter()
        .filter(|r| TitleIndex::normalize(&r.concept) == normalized)
        .filter_map(|r| {
            let prerequisite_id = index.resolve(&r.prerequisite)?;
            let reason = Some(r.reason.trim()).filter(|reason| !reason.is_empty());
            Some((prerequisite_id.to_string(), reason))
        })
        .filter(|(prerequisite_id, _)| prerequisite_id != id)
        .collect()
}
