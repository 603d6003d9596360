//! Category validation report

use serde::{Deserialize, Serialize};

/// Kind of structural problem found in a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The concept is reachable from its own prerequisites
    CircularDependency,
    /// A prerequisite id does not exist in the store
    MissingPrerequisite,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CircularDependency => "circular_dependency",
            Self::MissingPrerequisite => "missing_prerequisite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Title of the affected concept
    pub concept: String,
    pub concept_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisite: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn circular(concept_title: &str, concept_id: &str) -> Self {
        Self {
            kind: IssueKind::CircularDependency,
            concept: concept_title.to_string(),
            concept_id: concept_id.to_string(),
            prerequisite: None,
            message: "Circular dependency detected".to_string(),
        }
    }

    pub fn missing(concept_title: &str, concept_id: &str, prerequisite_id: &str) -> Self {
        Self {
            kind: IssueKind::MissingPrerequisite,
            concept: concept_title.to_string(),
            concept_id: concept_id.to_string(),
            prerequisite: Some(prerequisite_id.to_string()),
            message: format!("Prerequisite '{}' does not exist", prerequisite_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    DifficultyAdjustment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFix {
    #[serde(rename = "type")]
    pub kind: FixKind,
    /// Title of the adjusted concept
    pub concept: String,
    pub concept_id: String,
    pub new_difficulty: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Passed,
    HasIssues,
}

/// Result of validating (and repairing) one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub category: String,
    pub total_concepts: usize,
    pub issues_found: usize,
    pub issues: Vec<ValidationIssue>,
    pub fixes_applied: usize,
    pub fixes: Vec<ValidationFix>,
    pub validation_status: ValidationStatus,
}

impl ValidationReport {
    pub fn new(
        category: impl Into<String>,
        total_concepts: usize,
        issues: Vec<ValidationIssue>,
        fixes: Vec<ValidationFix>,
    ) -> Self {
        let validation_status = if issues.is_empty() {
            ValidationStatus::Passed
        } else {
            ValidationStatus::HasIssues
        };

        Self {
            category: category.into(),
            total_concepts,
            issues_found: issues.len(),
            issues,
            fixes_applied: fixes.len(),
            fixes,
            validation_status,
        }
    }

    pub fn passed(&self) -> bool {
        self.validation_status == ValidationStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_shape() {
        let report = ValidationReport::new(
            "calculus",
            2,
            vec![ValidationIssue::missing("Derivatives", "derivatives", "limits")],
            vec![ValidationFix {
                kind: FixKind::DifficultyAdjustment,
                concept: "Integrals".into(),
                concept_id: "integrals".into(),
                new_difficulty: 3,
            }],
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["validation_status"], "has_issues");
        assert_eq!(value["issues_found"], 1);
        assert_eq!(value["issues"][0]["type"], "missing_prerequisite");
        assert_eq!(value["issues"][0]["concept"], "Derivatives");
        assert_eq!(value["issues"][0]["prerequisite"], "limits");
        assert_eq!(value["fixes"][0]["type"], "difficulty_adjustment");
        assert_eq!(value["fixes"][0]["new_difficulty"], 3);
    }

    #[test]
    fn test_circular_issue_omits_prerequisite() {
        let issue = ValidationIssue::circular("Loop", "loop");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "circular_dependency");
        assert!(value.get("prerequisite").is_none());
    }

    #[test]
    fn test_empty_report_passes() {
        let report = ValidationReport::new("empty", 0, vec![], vec![]);
        assert!(report.passed());
        assert_eq!(report.fixes_applied, 0);
    }
}
