//! Per-user learning progress

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A user's completed and in-progress concepts
///
/// The two sets are kept disjoint: completing a concept removes it from
/// `in_progress`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    #[serde(default)]
    pub completed: BTreeSet<String>,
    #[serde(default)]
    pub in_progress: BTreeSet<String>,
}

impl UserProgress {
    /// Empty progress for a user seen for the first time
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            completed: BTreeSet::new(),
            in_progress: BTreeSet::new(),
        }
    }

    pub fn is_completed(&self, concept_id: &str) -> bool {
        self.completed.contains(concept_id)
    }

    pub fn is_in_progress(&self, concept_id: &str) -> bool {
        self.in_progress.contains(concept_id)
    }

    /// Move a concept to `completed`. Returns false if it already was.
    pub fn complete(&mut self, concept_id: &str) -> bool {
        self.in_progress.remove(concept_id);
        self.completed.insert(concept_id.to_string())
    }

    /// Mark a concept as started. Completed concepts are left alone.
    pub fn start(&mut self, concept_id: &str) -> bool {
        if self.completed.contains(concept_id) {
            return false;
        }
        self.in_progress.insert(concept_id.to_string())
    }

    /// Forget everything recorded about a concept
    pub fn reset(&mut self, concept_id: &str) -> bool {
        let removed_completed = self.completed.remove(concept_id);
        let removed_started = self.in_progress.remove(concept_id);
        removed_completed || removed_started
    }

    /// Record progress as a percentage
    ///
    /// 0 forgets the concept, 100 completes it, anything between marks it
    /// in progress (moving it back out of `completed` if needed). Returns
    /// whether anything changed.
    pub fn record_percent(&mut self, concept_id: &str, percent: u8) -> bool {
        match percent {
            0 => self.reset(concept_id),
            100.. => self.complete(concept_id),
            _ => {
                let reopened = self.completed.remove(concept_id);
                self.start(concept_id) || reopened
            }
        }
    }

    /// Every concept id this progress refers to
    pub fn referenced_ids(&self) -> impl Iterator<Item = &String> {
        self.completed.iter().chain(self.in_progress.iter())
    }
}

/// Portable form of [`UserProgress`]
///
/// `{"user_id": "...", "completed": [...], "in_progress": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub user_id: String,
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub in_progress: Vec<String>,
}

impl ProgressSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("Malformed progress snapshot: {}", e)))
    }

    /// Ids that appear in both `completed` and `in_progress`
    pub fn overlapping_ids(&self) -> Vec<String> {
        let completed: BTreeSet<&String> = self.completed.iter().collect();
        let overlap: BTreeSet<&String> = self
            .in_progress
            .iter()
            .filter(|id| completed.contains(id))
            .collect();
        overlap.into_iter().cloned().collect()
    }

    /// Convert into progress owned by `user_id`
    pub fn into_progress(self, user_id: &str) -> UserProgress {
        UserProgress {
            user_id: user_id.to_string(),
            completed: self.completed.into_iter().collect(),
            in_progress: self.in_progress.into_iter().collect(),
        }
    }
}

impl From<&UserProgress> for ProgressSnapshot {
    fn from(progress: &UserProgress) -> Self {
        Self {
            user_id: progress.user_id.clone(),
            completed: progress.completed.iter().cloned().collect(),
            in_progress: progress.in_progress.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_moves_out_of_in_progress() {
        let mut progress = UserProgress::new("ada");
        assert!(progress.start("limits"));
        assert!(progress.complete("limits"));
        assert!(!progress.complete("limits"));

        assert!(progress.is_completed("limits"));
        assert!(!progress.is_in_progress("limits"));
    }

    #[test]
    fn test_start_ignores_completed() {
        let mut progress = UserProgress::new("ada");
        progress.complete("limits");
        assert!(!progress.start("limits"));
        assert!(progress.in_progress.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut progress = UserProgress::new("ada");
        progress.start("sets");
        assert!(progress.reset("sets"));
        assert!(!progress.reset("sets"));
    }

    #[test]
    fn test_record_percent_maps_to_sets() {
        let mut progress = UserProgress::new("ada");

        assert!(progress.record_percent("limits", 40));
        assert!(!progress.record_percent("limits", 60));
        assert!(progress.is_in_progress("limits"));

        assert!(progress.record_percent("limits", 100));
        assert!(progress.is_completed("limits"));

        // Dropping below 100 reopens a completed concept
        assert!(progress.record_percent("limits", 80));
        assert!(progress.is_in_progress("limits"));
        assert!(!progress.is_completed("limits"));

        assert!(progress.record_percent("limits", 0));
        assert_eq!(progress.referenced_ids().count(), 0);
    }

    #[test]
    fn test_snapshot_overlap_detection() {
        let snapshot = ProgressSnapshot {
            user_id: "ada".into(),
            completed: vec!["a".into(), "b".into()],
            in_progress: vec!["b".into(), "c".into()],
        };
        assert_eq!(snapshot.overlapping_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut progress = UserProgress::new("ada");
        progress.complete("limits");
        progress.start("derivatives");

        let json = ProgressSnapshot::from(&progress).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["user_id"], "ada");
        assert_eq!(value["completed"][0], "limits");
        assert_eq!(value["in_progress"][0], "derivatives");
    }

    #[test]
    fn test_malformed_snapshot_is_invalid_input() {
        let err = ProgressSnapshot::from_json("{not json").unwrap_err();
        assert_eq!(err.code(), "E800");
    }
}
