//! Dependency graph engine
//!
//! Owns the cross-node invariants of the concept graph: no self-loops, no
//! cycles, and difficulty strictly increasing along prerequisite edges
//! (repaired on validation). All graph state is read from and written to a
//! [`GraphStore`]; the engine itself keeps only locks.
//!
//! Edge insertion holds the graph-wide structural lock for its reachability
//! check and commit, then the lock of the concept row it rewrites. The
//! structural lock is always taken first.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{GraphConfig, RepairMode};
use crate::domain::concept::{Concept, GraphStore, PrerequisiteEdge};
use crate::error::{Error, Result};

use super::locks::{KeyedLocks, acquire_within, store_call};
use super::validation::{FixKind, ValidationFix, ValidationIssue, ValidationReport};

const STRUCTURAL_LOCK: &str = "graph:structure";

/// Result of an edge insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeOutcome {
    /// False when the edge was already present
    pub applied: bool,
    pub edge: PrerequisiteEdge,
}

/// A concept together with its resolved prerequisites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptNode {
    #[serde(flatten)]
    pub concept: Concept,
    pub prerequisites: Vec<PrerequisiteRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteRef {
    pub id: String,
    /// None when the prerequisite does not exist in the store
    pub title: Option<String>,
}

pub struct DependencyGraphEngine<S: GraphStore> {
    store: Arc<S>,
    config: GraphConfig,
    concept_locks: KeyedLocks,
    structure: Mutex<()>,
}

impl<S: GraphStore> DependencyGraphEngine<S> {
    pub fn new(store: Arc<S>, config: GraphConfig) -> Self {
        Self {
            store,
            config,
            concept_locks: KeyedLocks::new(),
            structure: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ========== Store access ==========

    async fn fetch(&self, id: &str) -> Result<Option<Concept>> {
        store_call("get", self.config.store_timeout(), self.store.get(id)).await
    }

    async fn fetch_existing(&self, id: &str) -> Result<Concept> {
        self.fetch(id)
            .await?
            .ok_or_else(|| Error::ConceptNotFound(id.to_string()))
    }

    async fn persist(&self, concept: &Concept) -> Result<()> {
        store_call("save", self.config.store_timeout(), self.store.save(concept)).await
    }

    /// Get a concept by id
    pub async fn concept(&self, id: &str) -> Result<Concept> {
        self.fetch_existing(id).await
    }

    /// List concepts, ordered by difficulty then id
    pub async fn concepts(&self, category: Option<&str>) -> Result<Vec<Concept>> {
        store_call("list", self.config.store_timeout(), self.store.list(category)).await
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        store_call(
            "categories",
            self.config.store_timeout(),
            self.store.categories(),
        )
        .await
    }

    /// Concepts whose title or description contains `query`, ignoring case
    pub async fn search_concepts(
        &self,
        query: &str,
        category: Option<&str>,
    ) -> Result<Vec<Concept>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Search query must not be empty".into()));
        }
        store_call(
            "search",
            self.config.store_timeout(),
            self.store.search(query, category),
        )
        .await
    }

    /// Concepts whose difficulty lies within `min..=max`; either bound may be open
    pub async fn concepts_in_range(
        &self,
        category: Option<&str>,
        min: Option<u32>,
        max: Option<u32>,
    ) -> Result<Vec<Concept>> {
        if let (Some(min), Some(max)) = (min, max)
            && min > max
        {
            return Err(Error::InvalidInput(format!(
                "Difficulty range {}..{} is empty",
                min, max
            )));
        }

        let mut concepts = self.concepts(category).await?;
        concepts.retain(|c| {
            min.is_none_or(|min| c.difficulty >= min) && max.is_none_or(|max| c.difficulty <= max)
        });
        Ok(concepts)
    }

    // ========== Mutations ==========

    /// Create a concept, or return the existing one with the same id
    ///
    /// Initial prerequisites must already exist. Creation is checked for
    /// cycles too, since an existing concept may hold a dangling reference
    /// to the new id.
    pub async fn create_concept(&self, concept: Concept) -> Result<Concept> {
        self.create_or_get(concept).await.map(|(stored, _)| stored)
    }

    /// Like [`Self::create_concept`], also reporting whether a new row was written
    pub async fn create_or_get(&self, concept: Concept) -> Result<(Concept, bool)> {
        if concept.id.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Title '{}' does not produce a usable concept id",
                concept.title
            )));
        }
        if concept.difficulty < 1 {
            return Err(Error::InvalidInput(format!(
                "Difficulty of '{}' must be at least 1",
                concept.id
            )));
        }
        if concept.has_prerequisite(&concept.id) {
            return Err(Error::cycle(&concept.id, &concept.id));
        }

        if concept.prerequisite_ids.is_empty() {
            return self.insert(&concept).await;
        }

        let _structure =
            acquire_within(&self.structure, STRUCTURAL_LOCK, self.config.lock_timeout()).await?;

        if let Some(existing) = self.fetch(&concept.id).await? {
            debug!(concept_id = %existing.id, "Concept already exists");
            return Ok((existing, false));
        }

        for prerequisite_id in &concept.prerequisite_ids {
            self.fetch_existing(prerequisite_id).await?;
            if self.reaches(prerequisite_id, &concept.id).await? {
                warn!(
                    concept_id = %concept.id,
                    prerequisite_id = %prerequisite_id,
                    "Rejected concept creation that would close a cycle"
                );
                return Err(Error::cycle(&concept.id, prerequisite_id));
            }
        }

        self.insert(&concept).await
    }

    async fn insert(&self, concept: &Concept) -> Result<(Concept, bool)> {
        let stored = store_call(
            "upsert",
            self.config.store_timeout(),
            self.store.upsert(concept),
        )
        .await?;

        let created = stored == *concept;
        if created {
            info!(
                concept_id = %stored.id,
                category = %stored.category,
                difficulty = stored.difficulty,
                "Concept created"
            );
        } else {
            debug!(concept_id = %stored.id, "Concept already exists");
        }
        Ok((stored, created))
    }

    /// Change a concept's title and/or description
    ///
    /// The id stays the one derived at creation, so existing edges and
    /// progress keep pointing at it. Difficulty and edges have their own
    /// operations.
    pub async fn update_concept(
        &self,
        concept_id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Concept> {
        let title = title.map(str::trim);
        if title.is_some_and(str::is_empty) {
            return Err(Error::InvalidInput("Title must not be empty".into()));
        }

        let _row = self
            .concept_locks
            .acquire(concept_id, self.config.lock_timeout())
            .await?;

        let mut concept = self.fetch_existing(concept_id).await?;
        if concept.rewrite(title, description.map(str::trim)) {
            self.persist(&concept).await?;
            info!(concept_id = %concept_id, "Concept updated");
        }
        Ok(concept)
    }

    /// Add the edge `prerequisite_id -> concept_id`
    ///
    /// Rejected with [`Error::CycleDetected`] (and nothing written) if the
    /// prerequisite already depends on the concept, directly or transitively.
    pub async fn add_prerequisite_edge(
        &self,
        concept_id: &str,
        prerequisite_id: &str,
        reason: Option<&str>,
    ) -> Result<EdgeOutcome> {
        let _structure =
            acquire_within(&self.structure, STRUCTURAL_LOCK, self.config.lock_timeout()).await?;
        let _row = self
            .concept_locks
            .acquire(concept_id, self.config.lock_timeout())
            .await?;

        let mut concept = self.fetch_existing(concept_id).await?;
        self.fetch_existing(prerequisite_id).await?;

        if concept.has_prerequisite(prerequisite_id) {
            debug!(concept_id = %concept_id, prerequisite_id = %prerequisite_id, "Edge already present");
            return Ok(EdgeOutcome {
                applied: false,
                edge: edge_of(&concept, prerequisite_id),
            });
        }

        if concept_id == prerequisite_id || self.reaches(prerequisite_id, concept_id).await? {
            warn!(
                concept_id = %concept_id,
                prerequisite_id = %prerequisite_id,
                "Rejected prerequisite edge that would create a cycle"
            );
            return Err(Error::cycle(concept_id, prerequisite_id));
        }

        concept.add_prerequisite(prerequisite_id, reason);
        self.persist(&concept).await?;

        info!(concept_id = %concept_id, prerequisite_id = %prerequisite_id, "Prerequisite edge added");
        Ok(EdgeOutcome {
            applied: true,
            edge: edge_of(&concept, prerequisite_id),
        })
    }

    /// Remove the edge `prerequisite_id -> concept_id`
    ///
    /// Returns whether an edge was removed.
    pub async fn remove_prerequisite_edge(
        &self,
        concept_id: &str,
        prerequisite_id: &str,
    ) -> Result<bool> {
        let _structure =
            acquire_within(&self.structure, STRUCTURAL_LOCK, self.config.lock_timeout()).await?;
        let _row = self
            .concept_locks
            .acquire(concept_id, self.config.lock_timeout())
            .await?;

        let mut concept = self.fetch_existing(concept_id).await?;
        if !concept.remove_prerequisite(prerequisite_id) {
            return Ok(false);
        }
        self.persist(&concept).await?;

        info!(concept_id = %concept_id, prerequisite_id = %prerequisite_id, "Prerequisite edge removed");
        Ok(true)
    }

    /// Whether `target` is reachable from `from` by following prerequisite ids
    ///
    /// Dangling ids count as reachable nodes so that a later creation with
    /// that id is still checked.
    async fn reaches(&self, from: &str, target: &str) -> Result<bool> {
        let mut queue = VecDeque::from([from.to_string()]);
        let mut seen = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if id == target {
                return Ok(true);
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(concept) = self.fetch(&id).await? {
                queue.extend(
                    concept
                        .prerequisite_ids
                        .into_iter()
                        .filter(|p| !seen.contains(p)),
                );
            }
        }
        Ok(false)
    }

    // ========== Queries ==========

    /// Every transitive prerequisite of a concept, depth-first, each once
    ///
    /// The root id appears in the result only if the traversal returns to
    /// it, which signals a circular dependency. Dangling ids are skipped.
    pub async fn dependency_chain(&self, concept_id: &str) -> Result<Vec<String>> {
        let root = self.fetch_existing(concept_id).await?;

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<String> = root.prerequisite_ids.iter().rev().cloned().collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if id == root.id {
                chain.push(id);
                continue;
            }
            let Some(concept) = self.fetch(&id).await? else {
                continue;
            };
            chain.push(id);
            stack.extend(
                concept
                    .prerequisite_ids
                    .into_iter()
                    .rev()
                    .filter(|p| !visited.contains(p)),
            );
        }

        Ok(chain)
    }

    /// Report cycles and missing prerequisites, and repair difficulty ordering
    pub async fn validate_category(&self, category: &str) -> Result<ValidationReport> {
        let concepts = self.concepts(Some(category)).await?;
        let mut issues = Vec::new();

        for concept in &concepts {
            let chain = self.dependency_chain(&concept.id).await?;
            if chain.contains(&concept.id) {
                issues.push(ValidationIssue::circular(&concept.title, &concept.id));
            }
            for prerequisite_id in &concept.prerequisite_ids {
                if self.fetch(prerequisite_id).await?.is_none() {
                    issues.push(ValidationIssue::missing(
                        &concept.title,
                        &concept.id,
                        prerequisite_id,
                    ));
                }
            }
        }

        let order: Vec<String> = concepts.iter().map(|c| c.id.clone()).collect();
        let fixes = self.repair_difficulties(&order).await?;

        let report = ValidationReport::new(category, concepts.len(), issues, fixes);
        info!(
            category = %category,
            total = report.total_concepts,
            issues = report.issues_found,
            fixes = report.fixes_applied,
            mode = self.config.repair_mode.as_str(),
            "Category validated"
        );
        Ok(report)
    }

    /// Raise difficulties until each concept is harder than its prerequisites
    ///
    /// Several adjustments to one concept collapse into a single fix carrying
    /// the final difficulty.
    async fn repair_difficulties(&self, order: &[String]) -> Result<Vec<ValidationFix>> {
        let max_passes = match self.config.repair_mode {
            RepairMode::SinglePass => 1,
            RepairMode::FixedPoint => order.len().max(1),
        };

        let mut fixes: Vec<ValidationFix> = Vec::new();
        let mut fix_index: HashMap<String, usize> = HashMap::new();

        for pass in 0..max_passes {
            let mut changed = false;

            for id in order {
                let _row = self
                    .concept_locks
                    .acquire(id, self.config.lock_timeout())
                    .await?;

                let Some(mut concept) = self.fetch(id).await? else {
                    continue;
                };

                if concept.prerequisite_ids.is_empty() {
                    continue;
                }

                // Dangling prerequisites count at the floor difficulty of 1
                let mut max_prerequisite = 1;
                for prerequisite_id in &concept.prerequisite_ids {
                    if let Some(prerequisite) = self.fetch(prerequisite_id).await? {
                        max_prerequisite = max_prerequisite.max(prerequisite.difficulty);
                    }
                }

                if concept.difficulty > max_prerequisite {
                    continue;
                }

                let new_difficulty = max_prerequisite.saturating_add(1);
                concept.set_difficulty(new_difficulty);
                self.persist(&concept).await?;
                changed = true;

                debug!(concept_id = %id, new_difficulty, pass, "Difficulty adjusted");

                match fix_index.get(id) {
                    Some(&i) => fixes[i].new_difficulty = new_difficulty,
                    None => {
                        fix_index.insert(id.clone(), fixes.len());
                        fixes.push(ValidationFix {
                            kind: FixKind::DifficultyAdjustment,
                            concept: concept.title.clone(),
                            concept_id: id.clone(),
                            new_difficulty,
                        });
                    }
                }
            }

            if !changed {
                break;
            }
            if pass + 1 == max_passes && self.config.repair_mode == RepairMode::FixedPoint {
                warn!(passes = max_passes, "Difficulty repair stopped before reaching a fixed point");
            }
        }

        Ok(fixes)
    }

    /// Study order for a category
    ///
    /// Prerequisites outside the category count as satisfied. Ties go to the
    /// lower difficulty, then the lower id.
    pub async fn topological_learning_path(&self, category: &str) -> Result<Vec<String>> {
        let concepts = self.concepts(Some(category)).await?;
        topological_order(&concepts)
    }

    /// A concept's transitive prerequisites followed by the concept itself,
    /// in study order
    pub async fn learning_path_for(&self, concept_id: &str) -> Result<Vec<Concept>> {
        let chain = self.dependency_chain(concept_id).await?;
        if chain.iter().any(|id| id == concept_id) {
            let root = self.fetch_existing(concept_id).await?;
            let via = root
                .prerequisite_ids
                .first()
                .cloned()
                .unwrap_or_else(|| concept_id.to_string());
            return Err(Error::cycle(concept_id, via));
        }

        let root_id = concept_id.to_string();
        let mut concepts = Vec::with_capacity(chain.len() + 1);
        for id in chain.iter().chain(std::iter::once(&root_id)) {
            if let Some(concept) = self.fetch(id).await? {
                concepts.push(concept);
            }
        }

        let order = topological_order(&concepts)?;
        let mut by_id: HashMap<String, Concept> =
            concepts.into_iter().map(|c| (c.id.clone(), c)).collect();
        Ok(order.into_iter().filter_map(|id| by_id.remove(&id)).collect())
    }

    /// Concepts of a category with their prerequisite titles resolved
    pub async fn category_tree(&self, category: &str) -> Result<Vec<ConceptNode>> {
        let concepts = self.concepts(Some(category)).await?;
        let mut titles: HashMap<String, String> = concepts
            .iter()
            .map(|c| (c.id.clone(), c.title.clone()))
            .collect();

        let mut nodes = Vec::with_capacity(concepts.len());
        for concept in concepts {
            let mut prerequisites = Vec::with_capacity(concept.prerequisite_ids.len());
            for id in &concept.prerequisite_ids {
                let title = match titles.get(id) {
                    Some(title) => Some(title.clone()),
                    None => {
                        let found = self.fetch(id).await?.map(|c| c.title);
                        if let Some(title) = &found {
                            titles.insert(id.clone(), title.clone());
                        }
                        found
                    }
                };
                prerequisites.push(PrerequisiteRef {
                    id: id.clone(),
                    title,
                });
            }
            nodes.push(ConceptNode {
                concept,
                prerequisites,
            });
        }
        Ok(nodes)
    }
}

fn edge_of(concept: &Concept, prerequisite_id: &str) -> PrerequisiteEdge {
    PrerequisiteEdge {
        concept_id: concept.id.clone(),
        prerequisite_id: prerequisite_id.to_string(),
        reason: concept.edge_reasons.get(prerequisite_id).cloned(),
    }
}

/// Kahn ordering of a set of concepts, edges outside the set ignored
fn topological_order(concepts: &[Concept]) -> Result<Vec<String>> {
    let members: HashMap<&str, &Concept> = concepts.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for concept in concepts {
        let internal: BTreeSet<&str> = concept
            .prerequisite_ids
            .iter()
            .map(String::as_str)
            .filter(|p| members.contains_key(p))
            .collect();
        in_degree.insert(concept.id.as_str(), internal.len());
        for prerequisite in internal {
            dependents
                .entry(prerequisite)
                .or_default()
                .push(concept.id.as_str());
        }
    }

    let mut ready: BTreeSet<(u32, &str)> = concepts
        .iter()
        .filter(|c| in_degree.get(c.id.as_str()) == Some(&0))
        .map(|c| (c.difficulty, c.id.as_str()))
        .collect();

    let mut order = Vec::with_capacity(concepts.len());
    while let Some(next) = ready.pop_first() {
        let (_, id) = next;
        order.push(id.to_string());

        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0
                    && let Some(concept) = members.get(dependent)
                {
                    ready.insert((concept.difficulty, *dependent));
                }
            }
        }
    }

    if order.len() < concepts.len() {
        let placed: HashSet<&str> = order.iter().map(String::as_str).collect();
        let stuck = concepts
            .iter()
            .find(|c| !placed.contains(c.id.as_str()))
            .map(|c| {
                let via = c
                    .prerequisite_ids
                    .iter()
                    .find(|p| members.contains_key(p.as_str()) && !placed.contains(p.as_str()))
                    .cloned()
                    .unwrap_or_default();
                (c.id.clone(), via)
            })
            .unwrap_or_default();
        return Err(Error::cycle(stuck.0, stuck.1));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::graph::InMemoryGraphStore;
    use std::time::Duration;

    fn engine_with(mode: RepairMode) -> DependencyGraphEngine<InMemoryGraphStore> {
        let config = GraphConfig {
            repair_mode: mode,
            ..GraphConfig::default()
        };
        DependencyGraphEngine::new(Arc::new(InMemoryGraphStore::new()), config)
    }

    fn engine() -> DependencyGraphEngine<InMemoryGraphStore> {
        engine_with(RepairMode::FixedPoint)
    }

    async fn add(
        engine: &DependencyGraphEngine<InMemoryGraphStore>,
        title: &str,
        category: &str,
        difficulty: u32,
    ) -> Concept {
        engine
            .create_concept(Concept::new(title, category).with_difficulty(difficulty))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let engine = engine();
        let first = engine
            .create_concept(Concept::new("Sets", "math").with_description("original"))
            .await
            .unwrap();
        let (second, created) = engine
            .create_or_get(Concept::new("Sets", "math").with_description("replacement"))
            .await
            .unwrap();

        assert!(!created);
        assert_eq!(second, first);
        assert_eq!(second.description, "original");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_id_and_missing_prerequisite() {
        let engine = engine();

        let err = engine.create_concept(Concept::new("???", "math")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = engine
            .create_concept(Concept::new("Groups", "math").with_prerequisites(["sets"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConceptNotFound(ref id) if id == "sets"));
    }

    #[tokio::test]
    async fn test_create_rejects_self_loop() {
        let engine = engine();
        let err = engine
            .create_concept(Concept::new("Loop", "math").with_prerequisites(["loop"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[tokio::test]
    async fn test_reverse_edge_is_rejected_and_graph_unchanged() {
        let engine = engine();
        add(&engine, "A", "m", 1).await;
        add(&engine, "B", "m", 1).await;

        let outcome = engine.add_prerequisite_edge("b", "a", None).await.unwrap();
        assert!(outcome.applied);

        let err = engine.add_prerequisite_edge("a", "b", None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::CycleDetected { ref concept, ref prerequisite } if concept == "a" && prerequisite == "b"
        ));

        assert!(engine.concept("a").await.unwrap().prerequisite_ids.is_empty());
        assert_eq!(engine.concept("b").await.unwrap().prerequisite_ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_transitive_cycle_is_rejected() {
        let engine = engine();
        for title in ["A", "B", "C"] {
            add(&engine, title, "m", 1).await;
        }
        engine.add_prerequisite_edge("b", "a", None).await.unwrap();
        engine.add_prerequisite_edge("c", "b", None).await.unwrap();

        let err = engine.add_prerequisite_edge("a", "c", None).await.unwrap_err();
        assert!(err.is_integrity_violation());
        assert!(engine.concept("a").await.unwrap().prerequisite_ids.is_empty());
    }

    #[tokio::test]
    async fn test_self_edge_is_rejected() {
        let engine = engine();
        add(&engine, "A", "m", 1).await;
        let err = engine.add_prerequisite_edge("a", "a", None).await.unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_edge_not_applied_twice() {
        let engine = engine();
        add(&engine, "A", "m", 1).await;
        add(&engine, "B", "m", 2).await;

        let first = engine
            .add_prerequisite_edge("b", "a", Some("basics first"))
            .await
            .unwrap();
        let second = engine.add_prerequisite_edge("b", "a", None).await.unwrap();

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(second.edge.reason.as_deref(), Some("basics first"));
        assert_eq!(engine.concept("b").await.unwrap().prerequisite_ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_edge_to_missing_concept() {
        let engine = engine();
        add(&engine, "A", "m", 1).await;
        let err = engine
            .add_prerequisite_edge("a", "ghost", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConceptNotFound(ref id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_remove_edge() {
        let engine = engine();
        add(&engine, "A", "m", 1).await;
        add(&engine, "B", "m", 2).await;
        engine.add_prerequisite_edge("b", "a", None).await.unwrap();

        assert!(engine.remove_prerequisite_edge("b", "a").await.unwrap());
        assert!(!engine.remove_prerequisite_edge("b", "a").await.unwrap());

        // The reverse edge is legal once the original is gone
        assert!(engine.add_prerequisite_edge("a", "b", None).await.unwrap().applied);
    }

    #[tokio::test]
    async fn test_dependency_chain_visits_each_once() {
        let engine = engine();
        for title in ["A", "B", "C", "D"] {
            add(&engine, title, "m", 1).await;
        }
        // Diamond: D <- B <- A, D <- C <- A
        engine.add_prerequisite_edge("b", "a", None).await.unwrap();
        engine.add_prerequisite_edge("c", "a", None).await.unwrap();
        engine.add_prerequisite_edge("d", "b", None).await.unwrap();
        engine.add_prerequisite_edge("d", "c", None).await.unwrap();

        let chain = engine.dependency_chain("d").await.unwrap();
        assert_eq!(chain, vec!["b", "a", "c"]);
        assert!(!chain.contains(&"d".to_string()));
        assert!(engine.dependency_chain("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dependency_chain_reports_stored_cycle() {
        let store = Arc::new(InMemoryGraphStore::new());
        store
            .upsert(&Concept::new("A", "m").with_prerequisites(["b"]))
            .await
            .unwrap();
        store
            .upsert(&Concept::new("B", "m").with_prerequisites(["a", "ghost"]))
            .await
            .unwrap();
        let engine = DependencyGraphEngine::new(store, GraphConfig::default());

        let chain = engine.dependency_chain("a").await.unwrap();
        assert_eq!(chain, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_validate_raises_difficulty() {
        let engine = engine();
        add(&engine, "A", "m", 1).await;
        add(&engine, "B", "m", 1).await;
        engine.add_prerequisite_edge("b", "a", None).await.unwrap();

        let report = engine.validate_category("m").await.unwrap();

        assert_eq!(report.total_concepts, 2);
        assert_eq!(report.fixes_applied, 1);
        assert_eq!(report.fixes[0].concept, "B");
        assert_eq!(report.fixes[0].new_difficulty, 2);
        assert!(report.passed());
        assert_eq!(engine.concept("b").await.unwrap().difficulty, 2);
    }

    #[tokio::test]
    async fn test_dangling_prerequisite_still_raises_floor() {
        let store = Arc::new(InMemoryGraphStore::new());
        store
            .upsert(&Concept::new("Orphan", "m").with_prerequisites(["ghost"]))
            .await
            .unwrap();
        store.upsert(&Concept::new("Root", "m")).await.unwrap();
        let engine = DependencyGraphEngine::new(store, GraphConfig::default());

        let report = engine.validate_category("m").await.unwrap();

        assert_eq!(report.fixes_applied, 1);
        assert_eq!(report.fixes[0].concept_id, "orphan");
        assert_eq!(report.fixes[0].new_difficulty, 2);
        assert_eq!(engine.concept("root").await.unwrap().difficulty, 1);
    }

    #[tokio::test]
    async fn test_search_and_difficulty_range() {
        let engine = engine();
        add(&engine, "Limits", "calculus", 2).await;
        add(&engine, "Derivatives", "calculus", 3).await;
        add(&engine, "Integrals", "calculus", 5).await;
        engine
            .create_concept(
                Concept::new("Sequences", "analysis")
                    .with_description("Limits of sequences")
                    .with_difficulty(3),
            )
            .await
            .unwrap();

        let found: Vec<String> = engine
            .search_concepts(" LIMITS ", None)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(found, vec!["limits", "sequences"]);
        assert_eq!(
            engine.search_concepts("limits", Some("calculus")).await.unwrap().len(),
            1
        );
        assert!(matches!(
            engine.search_concepts("  ", None).await.unwrap_err(),
            Error::InvalidInput(_)
        ));

        let ranged: Vec<String> = engine
            .concepts_in_range(Some("calculus"), Some(2), Some(3))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ranged, vec!["limits", "derivatives"]);
        assert_eq!(engine.concepts_in_range(None, Some(3), None).await.unwrap().len(), 3);
        assert!(engine.concepts_in_range(None, Some(4), Some(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_concept_keeps_id_and_edges() {
        let engine = engine();
        add(&engine, "Limits", "calculus", 1).await;
        add(&engine, "Derivatives", "calculus", 2).await;
        engine
            .add_prerequisite_edge("derivatives", "limits", None)
            .await
            .unwrap();

        let updated = engine
            .update_concept("derivatives", Some("  Differentiation "), Some("Rates of change"))
            .await
            .unwrap();

        assert_eq!(updated.id, "derivatives");
        assert_eq!(updated.title, "Differentiation");
        assert_eq!(updated.prerequisite_ids, vec!["limits"]);
        assert_eq!(
            engine.concept("derivatives").await.unwrap().description,
            "Rates of change"
        );

        assert!(matches!(
            engine.update_concept("derivatives", Some(" "), None).await.unwrap_err(),
            Error::InvalidInput(_)
        ));
        assert!(matches!(
            engine.update_concept("ghost", Some("Ghost"), None).await.unwrap_err(),
            Error::ConceptNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_fixed_point_propagates_through_chain() {
        let engine = engine();
        // Listing order is by difficulty, so C is repaired before B in the first pass
        add(&engine, "A", "m", 3).await;
        add(&engine, "C", "m", 1).await;
        add(&engine, "B", "m", 2).await;
        engine.add_prerequisite_edge("b", "a", None).await.unwrap();
        engine.add_prerequisite_edge("c", "b", None).await.unwrap();

        let report = engine.validate_category("m").await.unwrap();

        let a = engine.concept("a").await.unwrap().difficulty;
        let b = engine.concept("b").await.unwrap().difficulty;
        let c = engine.concept("c").await.unwrap().difficulty;
        assert!(b > a);
        assert!(c > b);

        let c_fixes: Vec<_> = report.fixes.iter().filter(|f| f.concept_id == "c").collect();
        assert_eq!(c_fixes.len(), 1);
        assert_eq!(c_fixes[0].new_difficulty, c);
    }

    #[tokio::test]
    async fn test_single_pass_is_greedy() {
        let engine = engine_with(RepairMode::SinglePass);
        add(&engine, "A", "m", 3).await;
        add(&engine, "C", "m", 1).await;
        add(&engine, "B", "m", 2).await;
        engine.add_prerequisite_edge("b", "a", None).await.unwrap();
        engine.add_prerequisite_edge("c", "b", None).await.unwrap();

        engine.validate_category("m").await.unwrap();

        // C saw B at 2 before B was raised to 4
        assert_eq!(engine.concept("b").await.unwrap().difficulty, 4);
        assert_eq!(engine.concept("c").await.unwrap().difficulty, 3);
    }

    #[tokio::test]
    async fn test_validate_reports_missing_and_circular() {
        let store = Arc::new(InMemoryGraphStore::new());
        store
            .upsert(&Concept::new("A", "m").with_prerequisites(["b"]))
            .await
            .unwrap();
        store
            .upsert(&Concept::new("B", "m").with_prerequisites(["a"]))
            .await
            .unwrap();
        store
            .upsert(&Concept::new("C", "m").with_prerequisites(["ghost"]))
            .await
            .unwrap();
        let engine = DependencyGraphEngine::new(store, GraphConfig::default());

        let report = engine.validate_category("m").await.unwrap();

        assert!(!report.passed());
        let circular = report
            .issues
            .iter()
            .filter(|i| i.kind == crate::domain::graph::IssueKind::CircularDependency)
            .count();
        assert_eq!(circular, 2);
        assert!(report.issues.iter().any(|i| {
            i.concept_id == "c" && i.prerequisite.as_deref() == Some("ghost")
        }));
    }

    #[tokio::test]
    async fn test_topological_path_tie_breaks() {
        let engine = engine();
        add(&engine, "Zeta", "m", 1).await;
        add(&engine, "Alpha", "m", 1).await;
        add(&engine, "Beta", "m", 2).await;
        add(&engine, "Outside", "other", 1).await;
        engine.add_prerequisite_edge("alpha", "zeta", None).await.unwrap();
        engine.add_prerequisite_edge("beta", "outside", None).await.unwrap();

        let path = engine.topological_learning_path("m").await.unwrap();
        assert_eq!(path, vec!["zeta", "alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_topological_path_detects_stored_cycle() {
        let store = Arc::new(InMemoryGraphStore::new());
        store
            .upsert(&Concept::new("A", "m").with_prerequisites(["b"]))
            .await
            .unwrap();
        store
            .upsert(&Concept::new("B", "m").with_prerequisites(["a"]))
            .await
            .unwrap();
        let engine = DependencyGraphEngine::new(store, GraphConfig::default());

        let err = engine.topological_learning_path("m").await.unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[tokio::test]
    async fn test_learning_path_for_concept() {
        let engine = engine();
        add(&engine, "A", "m", 1).await;
        add(&engine, "B", "m", 2).await;
        add(&engine, "C", "m", 3).await;
        add(&engine, "Unrelated", "m", 1).await;
        engine.add_prerequisite_edge("b", "a", None).await.unwrap();
        engine.add_prerequisite_edge("c", "b", None).await.unwrap();

        let path: Vec<String> = engine
            .learning_path_for("c")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(path, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_category_tree_resolves_titles() {
        let engine = engine();
        add(&engine, "Limits", "calculus", 1).await;
        add(&engine, "Derivatives", "calculus", 2).await;
        engine
            .add_prerequisite_edge("derivatives", "limits", None)
            .await
            .unwrap();

        let tree = engine.category_tree("calculus").await.unwrap();
        let derivatives = tree.iter().find(|n| n.concept.id == "derivatives").unwrap();
        assert_eq!(
            derivatives.prerequisites,
            vec![PrerequisiteRef {
                id: "limits".into(),
                title: Some("Limits".into()),
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opposite_edges_cannot_both_commit() {
        for _ in 0..20 {
            let engine = Arc::new(engine());
            add(&engine, "A", "m", 1).await;
            add(&engine, "B", "m", 1).await;

            let e1 = engine.clone();
            let e2 = engine.clone();
            let (r1, r2) = tokio::join!(
                tokio::spawn(async move { e1.add_prerequisite_edge("a", "b", None).await }),
                tokio::spawn(async move { e2.add_prerequisite_edge("b", "a", None).await }),
            );
            let r1 = r1.unwrap();
            let r2 = r2.unwrap();

            assert!(r1.is_ok() != r2.is_ok(), "exactly one edge must commit");
            assert!(engine.topological_learning_path("m").await.is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cycle_across_three_concepts() {
        for _ in 0..20 {
            let engine = Arc::new(engine());
            for title in ["A", "B", "C"] {
                add(&engine, title, "m", 1).await;
            }
            engine.add_prerequisite_edge("b", "a", None).await.unwrap();

            // c <- b and a <- c are each acyclic alone but close a cycle together
            let e1 = engine.clone();
            let e2 = engine.clone();
            let (r1, r2) = tokio::join!(
                tokio::spawn(async move { e1.add_prerequisite_edge("c", "b", None).await }),
                tokio::spawn(async move { e2.add_prerequisite_edge("a", "c", None).await }),
            );

            assert!(r1.unwrap().is_ok() != r2.unwrap().is_ok());
            assert!(engine.topological_learning_path("m").await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_edge_insertion_times_out_while_structure_held() {
        let config = GraphConfig {
            lock_timeout_ms: 20,
            ..GraphConfig::default()
        };
        let engine = DependencyGraphEngine::new(Arc::new(InMemoryGraphStore::new()), config);
        add(&engine, "A", "m", 1).await;
        add(&engine, "B", "m", 1).await;

        let _held = engine.structure.lock().await;
        let err = tokio::time::timeout(
            Duration::from_secs(1),
            engine.add_prerequisite_edge("b", "a", None),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, Error::LockTimeout(_)));
    }
}
