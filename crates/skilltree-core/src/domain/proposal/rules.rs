//! Versioned domain prerequisite rules
//!
//! A rule fires when its trigger appears in a candidate title and inserts
//! the prerequisites the extraction left out. Rule sets are plain TOML:
//!
//! ```toml
//! name = "math"
//! version = 1
//!
//! [[rule]]
//! trigger = "chain rule"
//! prerequisites = ["derivatives", "composition"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::candidate::{CandidateConcept, CandidateRelationship};

const BUILTIN_MATH: &str = include_str!("../../../rules/math-v1.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteRule {
    pub trigger: String,
    pub prerequisites: Vec<String>,
}

/// An ordered list of rules; the first matching rule wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteRuleSet {
    pub name: String,
    pub version: u32,
    #[serde(default, rename = "rule")]
    pub rules: Vec<PrerequisiteRule>,
}

impl PrerequisiteRuleSet {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let set: Self = toml::from_str(contents)
            .map_err(|e| Error::ConfigError(format!("Invalid prerequisite rules: {}", e)))?;

        if let Some(rule) = set.rules.iter().find(|r| r.trigger.trim().is_empty()) {
            return Err(Error::ConfigError(format!(
                "Rule with prerequisites {:?} has an empty trigger",
                rule.prerequisites
            )));
        }
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// The bundled mathematics rules
    pub fn builtin_math() -> Result<Self> {
        Self::from_toml_str(BUILTIN_MATH)
    }

    /// `name@version`
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// First rule whose trigger occurs in `title`, case-insensitively
    pub fn matching_rule(&self, title: &str) -> Option<&PrerequisiteRule> {
        let title = title.to_lowercase();
        self.rules
            .iter()
            .find(|rule| title.contains(&rule.trigger.to_lowercase()))
    }

    /// Insert missing prerequisite concepts and the edges that need them
    ///
    /// Inserted concepts are fundamental, difficulty 1, and placed ahead of
    /// the existing candidates. Returns the titles that were inserted.
    pub fn interpolate(
        &self,
        concepts: &mut Vec<CandidateConcept>,
        relationships: &mut Vec<CandidateRelationship>,
    ) -> Vec<String> {
        let originals: Vec<String> = concepts.iter().map(|c| c.title.clone()).collect();
        let mut inserted: Vec<CandidateConcept> = Vec::new();

        for title in &originals {
            let Some(rule) = self.matching_rule(title) else {
                continue;
            };

            for prerequisite in &rule.prerequisites {
                if same_title(prerequisite, title) {
                    continue;
                }

                let existing = concepts
                    .iter()
                    .chain(inserted.iter())
                    .find(|c| same_title(&c.title, prerequisite))
                    .map(|c| c.title.clone());

                let prerequisite_title = match existing {
                    Some(existing) => existing,
                    None => {
                        let new_title = capitalize(prerequisite);
                        inserted.push(
                            CandidateConcept::new(&new_title)
                                .with_description(format!("Foundational concept for {}", title))
                                .with_difficulty(1)
                                .fundamental(),
                        );
                        new_title
                    }
                };

                let already_related = relationships.iter().any(|r| {
                    same_title(&r.concept, title) && same_title(&r.prerequisite, &prerequisite_title)
                });
                if !already_related {
                    relationships.push(
                        CandidateRelationship::new(title.clone(), prerequisite_title)
                            .with_reason(format!("Required by rule '{}'", rule.trigger)),
                    );
                }
            }
        }

        let titles: Vec<String> = inserted.iter().map(|c| c.title.clone()).collect();
        if !titles.is_empty() {
            debug!(rules = %self.label(), inserted = titles.len(), "Interpolated prerequisites");
            inserted.append(concepts);
            *concepts = inserted;
        }
        titles
    }
}

fn same_title(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> PrerequisiteRuleSet {
        PrerequisiteRuleSet::from_toml_str(
            r#"
            name = "test"
            version = 2

            [[rule]]
            trigger = "chain rule"
            prerequisites = ["derivatives", "composition"]

            [[rule]]
            trigger = "rule"
            prerequisites = ["never used"]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_builtin_rules_parse() {
        let set = PrerequisiteRuleSet::builtin_math().unwrap();
        assert_eq!(set.name, "math");
        assert!(set.matching_rule("The Chain Rule").is_some());
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let set = rules();
        let rule = set.matching_rule("Chain Rule in practice").unwrap();
        assert_eq!(rule.trigger, "chain rule");
        assert_eq!(set.label(), "test@2");
    }

    #[test]
    fn test_interpolate_inserts_missing_prerequisites() {
        let set = rules();
        let mut concepts = vec![
            CandidateConcept::new("Derivatives").with_difficulty(2),
            CandidateConcept::new("Chain Rule").with_difficulty(4),
        ];
        let mut relationships = vec![];

        let inserted = set.interpolate(&mut concepts, &mut relationships);

        assert_eq!(inserted, vec!["Composition"]);
        assert_eq!(concepts[0].title, "Composition");
        assert!(concepts[0].is_fundamental);
        assert_eq!(concepts[0].difficulty_level, Some(1));
        assert_eq!(concepts[0].description, "Foundational concept for Chain Rule");
        assert_eq!(concepts.len(), 3);

        // Both rule prerequisites become edges from the triggering concept
        assert_eq!(relationships.len(), 2);
        assert!(relationships
            .iter()
            .any(|r| r.concept == "Chain Rule" && r.prerequisite == "Derivatives"));
        assert!(relationships
            .iter()
            .any(|r| r.concept == "Chain Rule" && r.prerequisite == "Composition"));
    }

    #[test]
    fn test_interpolate_does_not_duplicate_relationships() {
        let set = rules();
        let mut concepts = vec![
            CandidateConcept::new("Derivatives"),
            CandidateConcept::new("Composition"),
            CandidateConcept::new("Chain Rule"),
        ];
        let mut relationships = vec![CandidateRelationship::new("chain rule", "derivatives")];

        let inserted = set.interpolate(&mut concepts, &mut relationships);

        assert!(inserted.is_empty());
        assert_eq!(relationships.len(), 2);
    }

    #[test]
    fn test_empty_trigger_rejected() {
        let err = PrerequisiteRuleSet::from_toml_str(
            "name = \"x\"\nversion = 1\n[[rule]]\ntrigger = \" \"\nprerequisites = []\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
