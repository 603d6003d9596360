//! In-memory graph and progress stores for tests and embedding

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::concept::{Concept, GraphStore};
use crate::domain::progress::{ProgressStore, UserProgress};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    concepts: RwLock<BTreeMap<String, Concept>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored concepts
    pub async fn len(&self) -> usize {
        self.concepts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.concepts.read().await.is_empty()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get(&self, id: &str) -> Result<Option<Concept>> {
        Ok(self.concepts.read().await.get(id).cloned())
    }

    async fn list(&self, category: Option<&str>) -> Result<Vec<Concept>> {
        let concepts = self.concepts.read().await;
        let mut listed: Vec<Concept> = concepts
            .values()
            .filter(|c| category.is_none_or(|cat| c.category == cat))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.difficulty.cmp(&b.difficulty).then_with(|| a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn search(&self, query: &str, category: Option<&str>) -> Result<Vec<Concept>> {
        let needle = query.to_lowercase();
        let mut found = self.list(category).await?;
        found.retain(|c| {
            c.title.to_lowercase().contains(&needle)
                || c.description.to_lowercase().contains(&needle)
        });
        Ok(found)
    }

    async fn upsert(&self, concept: &Concept) -> Result<Concept> {
        let mut concepts = self.concepts.write().await;
        Ok(concepts
            .entry(concept.id.clone())
            .or_insert_with(|| concept.clone())
            .clone())
    }

    async fn save(&self, concept: &Concept) -> Result<()> {
        let mut concepts = self.concepts.write().await;
        match concepts.get_mut(&concept.id) {
            Some(slot) => {
                *slot = concept.clone();
                Ok(())
            }
            None => Err(Error::ConceptNotFound(concept.id.clone())),
        }
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let concepts = self.concepts.read().await;
        let categories: BTreeSet<String> = concepts.values().map(|c| c.category.clone()).collect();
        Ok(categories.into_iter().collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    users: RwLock<HashMap<String, UserProgress>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserProgress>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn save(&self, progress: &UserProgress) -> Result<()> {
        self.users
            .write()
            .await
            .insert(progress.user_id.clone(), progress.clone());
        Ok(())
    }

    async fn learners_of(&self, concept_id: &str) -> Result<Vec<String>> {
        let users = self.users.read().await;
        let mut learners: Vec<String> = users
            .values()
            .filter(|p| p.is_completed(concept_id) || p.is_in_progress(concept_id))
            .map(|p| p.user_id.clone())
            .collect();
        learners.sort();
        Ok(learners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_keeps_existing() {
        let store = InMemoryGraphStore::new();
        store
            .upsert(&Concept::new("Sets", "math").with_difficulty(2))
            .await
            .unwrap();
        let stored = store.upsert(&Concept::new("Sets", "math")).await.unwrap();

        assert_eq!(stored.difficulty, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let store = InMemoryGraphStore::new();
        store
            .upsert(&Concept::new("B", "math").with_difficulty(2))
            .await
            .unwrap();
        store.upsert(&Concept::new("A", "math")).await.unwrap();
        store.upsert(&Concept::new("C", "art")).await.unwrap();

        let ids: Vec<String> = store
            .list(Some("math"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_search_matches_title_or_description() {
        let store = InMemoryGraphStore::new();
        store
            .upsert(&Concept::new("Matrix Operations", "linear").with_difficulty(2))
            .await
            .unwrap();
        store
            .upsert(&Concept::new("Eigenvalues", "linear").with_description("Scalars of a MATRIX"))
            .await
            .unwrap();
        store.upsert(&Concept::new("Matrices", "art")).await.unwrap();

        let ids: Vec<String> = store
            .search("matrix", Some("linear"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["eigenvalues", "matrix_operations"]);
        assert!(store.search("tensor", None).await.unwrap().is_empty());
    }
}
