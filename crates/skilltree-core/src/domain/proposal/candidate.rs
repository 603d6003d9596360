//! Candidate concepts and relationships
//!
//! Extraction output is untrusted: every field is optional or defaulted,
//! and numbers that arrive as strings are tolerated.

use serde::{Deserialize, Deserializer, Serialize};

/// Category used when neither the extraction nor the caller names one
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// A proposed concept, not yet committed to the graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateConcept {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    /// Id suggested by the collaborator; ignored in favour of the derived id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub difficulty_level: Option<u32>,
    #[serde(default)]
    pub is_fundamental: bool,
}

impl CandidateConcept {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty_level = Some(difficulty);
        self
    }

    pub fn fundamental(mut self) -> Self {
        self.is_fundamental = true;
        self
    }
}

/// A proposed prerequisite edge between two candidate titles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRelationship {
    /// Title of the dependent concept
    #[serde(default, deserialize_with = "lenient_text")]
    pub concept: String,
    /// Title of the prerequisite
    #[serde(default, deserialize_with = "lenient_text")]
    pub prerequisite: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: String,
}

impl CandidateRelationship {
    pub fn new(concept: impl Into<String>, prerequisite: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            prerequisite: prerequisite.into(),
            reason: String::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Raw output of the extraction collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub concepts: Vec<CandidateConcept>,
    #[serde(default)]
    pub relationships: Vec<CandidateRelationship>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub learning_path: String,
}

/// A set of candidates to merge into one category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalBatch {
    pub category: String,
    #[serde(default)]
    pub concepts: Vec<CandidateConcept>,
    #[serde(default)]
    pub relationships: Vec<CandidateRelationship>,
}

impl ProposalBatch {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_concept(mut self, concept: CandidateConcept) -> Self {
        self.concepts.push(concept);
        self
    }

    pub fn with_relationship(mut self, relationship: CandidateRelationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Build a batch from extraction output
    ///
    /// The category is the extracted one if non-blank, else the hint, else
    /// [`DEFAULT_CATEGORY`].
    pub fn from_extraction(result: ExtractionResult, category_hint: Option<&str>) -> Self {
        let category = result
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or_else(|| category_hint.map(str::trim).filter(|c| !c.is_empty()))
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();

        Self {
            category,
            concepts: result.concepts,
            relationships: result.relationships,
        }
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" -> "),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_tolerates_loose_fields() {
        let json = r#"{
            "category": "Calculus",
            "concepts": [
                {"title": "Limits", "difficulty_level": "2", "is_fundamental": true},
                {"title": "Derivatives", "description": null, "difficulty_level": 3.0},
                {"title": "Integrals", "difficulty_level": "hard"}
            ],
            "relationships": [{"concept": "Derivatives", "prerequisite": "Limits"}],
            "learning_path": ["Limits", "Derivatives"]
        }"#;

        let result: ExtractionResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.concepts[0].difficulty_level, Some(2));
        assert_eq!(result.concepts[1].difficulty_level, Some(3));
        assert_eq!(result.concepts[1].description, "");
        assert_eq!(result.concepts[2].difficulty_level, None);
        assert_eq!(result.relationships[0].reason, "");
        assert_eq!(result.learning_path, "Limits -> Derivatives");
    }

    #[test]
    fn test_missing_titles_do_not_sink_the_batch() {
        let json = r#"{
            "concepts": [
                {"title": "Limits"},
                {"description": "no title at all", "difficulty_level": 2},
                {"title": null}
            ],
            "relationships": [
                {"concept": "Derivatives", "prerequisite": "Limits"},
                {"concept": "Derivatives", "prerequisite": null},
                {"prerequisite": "Limits"}
            ]
        }"#;

        let result: ExtractionResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.concepts.len(), 3);
        assert_eq!(result.concepts[0].title, "Limits");
        assert_eq!(result.concepts[1].title, "");
        assert_eq!(result.concepts[1].difficulty_level, Some(2));
        assert_eq!(result.concepts[2].title, "");
        assert_eq!(result.relationships.len(), 3);
        assert_eq!(result.relationships[1].prerequisite, "");
        assert_eq!(result.relationships[2].concept, "");
    }

    #[test]
    fn test_batch_category_fallbacks() {
        let extracted = ExtractionResult {
            category: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(
            ProposalBatch::from_extraction(extracted.clone(), Some("Physics")).category,
            "Physics"
        );
        assert_eq!(
            ProposalBatch::from_extraction(extracted, None).category,
            DEFAULT_CATEGORY
        );

        let named = ExtractionResult {
            category: Some("Algebra".into()),
            ..Default::default()
        };
        assert_eq!(
            ProposalBatch::from_extraction(named, Some("Physics")).category,
            "Algebra"
        );
    }
}
