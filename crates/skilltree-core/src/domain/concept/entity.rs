//! Concept nodes and prerequisite edges
//!
//! A concept is a node in the shared learning graph. Its outgoing
//! prerequisite edges live on the node itself (`prerequisite_ids`), so an
//! edge is added or removed by rewriting one row.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a derived concept id
pub const MAX_CONCEPT_ID_LEN: usize = 30;

/// A learnable concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Stable id derived from the title (see [`slugify`])
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Category the concept belongs to
    pub category: String,
    /// Difficulty level, always at least 1
    pub difficulty: u32,
    /// Ids of direct prerequisites, in insertion order, without duplicates
    #[serde(default)]
    pub prerequisite_ids: Vec<String>,
    /// Reason attached to each prerequisite edge, keyed by prerequisite id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edge_reasons: BTreeMap<String, String>,
    /// When the concept was created
    pub created_at: DateTime<Utc>,
    /// When the concept was last mutated
    pub updated_at: DateTime<Utc>,
}

impl Concept {
    /// Create a concept whose id is derived from its title
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();

        Self {
            id: slugify(&title),
            title,
            description: String::new(),
            category: category.into(),
            difficulty: 1,
            prerequisite_ids: Vec::new(),
            edge_reasons: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Override the derived id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the difficulty (values below 1 are raised to 1)
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty.max(1);
        self
    }

    /// Set the initial prerequisites, dropping duplicates
    pub fn with_prerequisites<I, S>(mut self, prerequisite_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisite_ids.clear();
        for id in prerequisite_ids {
            let id = id.into();
            if !self.prerequisite_ids.contains(&id) {
                self.prerequisite_ids.push(id);
            }
        }
        self
    }

    /// Whether `prerequisite_id` is a direct prerequisite
    pub fn has_prerequisite(&self, prerequisite_id: &str) -> bool {
        self.prerequisite_ids.iter().any(|p| p == prerequisite_id)
    }

    /// Append a prerequisite edge. Returns false if it was already present.
    pub fn add_prerequisite(&mut self, prerequisite_id: &str, reason: Option<&str>) -> bool {
        if self.has_prerequisite(prerequisite_id) {
            return false;
        }
        self.prerequisite_ids.push(prerequisite_id.to_string());
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            self.edge_reasons
                .insert(prerequisite_id.to_string(), reason.to_string());
        }
        self.touch();
        true
    }

    /// Remove a prerequisite edge. Returns false if it was not present.
    pub fn remove_prerequisite(&mut self, prerequisite_id: &str) -> bool {
        let before = self.prerequisite_ids.len();
        self.prerequisite_ids.retain(|p| p != prerequisite_id);
        if self.prerequisite_ids.len() == before {
            return false;
        }
        self.edge_reasons.remove(prerequisite_id);
        self.touch();
        true
    }

    /// Set the difficulty and bump `updated_at`
    pub fn set_difficulty(&mut self, difficulty: u32) {
        self.difficulty = difficulty.max(1);
        self.touch();
    }

    /// Replace the title and/or description. The id is not rederived.
    ///
    /// Returns whether anything changed.
    pub fn rewrite(&mut self, title: Option<&str>, description: Option<&str>) -> bool {
        let mut changed = false;
        if let Some(title) = title.filter(|t| *t != self.title) {
            self.title = title.to_string();
            changed = true;
        }
        if let Some(description) = description.filter(|d| *d != self.description) {
            self.description = description.to_string();
            changed = true;
        }
        if changed {
            self.touch();
        }
        changed
    }

    /// The concept's outgoing prerequisite edges as distinct records
    pub fn edges(&self) -> Vec<PrerequisiteEdge> {
        self.prerequisite_ids
            .iter()
            .map(|p| PrerequisiteEdge {
                concept_id: self.id.clone(),
                prerequisite_id: p.clone(),
                reason: self.edge_reasons.get(p).cloned(),
            })
            .collect()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A directed edge: `prerequisite_id` must be learned before `concept_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub concept_id: String,
    pub prerequisite_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Derive a canonical concept id from a title
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single `_`, trims separators at both ends and truncates to
/// [`MAX_CONCEPT_ID_LEN`] characters. Returns an empty string for titles
/// with no alphanumeric characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    // Slug is ASCII, so byte truncation is char-safe
    slug.truncate(MAX_CONCEPT_ID_LEN);
    slug.trim_end_matches('_').to_string()
}
