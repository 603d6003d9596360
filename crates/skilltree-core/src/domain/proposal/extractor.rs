//! Natural-language concept extraction and the ingest pipeline
//!
//! [`ConceptExtractor`] turns free text into an [`ExtractionResult`].
//! [`ConceptIngestService`] chains extraction, rule interpolation and
//! proposal resolution into one call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::concept::GraphStore;
use crate::error::{Error, Result};
use crate::llm::{LlmClient, Message};

use super::candidate::{ExtractionResult, ProposalBatch};
use super::resolver::{ProposalReport, RelationshipProposalResolver};

const SYSTEM_PROMPT: &str = "You are an expert educational curriculum designer. \
You turn descriptions of what someone wants to learn into structured concept maps. \
Respond with a single JSON object and nothing else.";

/// Source of candidate concepts for a piece of text
#[async_trait]
pub trait ConceptExtractor: Send + Sync {
    async fn extract(&self, text: &str, category_hint: Option<&str>) -> Result<ExtractionResult>;
}

/// Extractor backed by an OpenAI-compatible chat completion endpoint
pub struct LlmConceptExtractor {
    client: LlmClient,
}

impl LlmConceptExtractor {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn build_prompt(text: &str, category_hint: Option<&str>) -> String {
        let hint = category_hint
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!("The concepts are primarily in category: {}\n\n", c))
            .unwrap_or_default();

        format!(
            r#"Parse the following text about topics, a table of contents, or concepts someone wants to learn.
Extract each concept and the prerequisite relationships between them.

{hint}Input text:
{text}

Respond with a JSON object of this shape:

{{
  "category": "inferred or provided category name",
  "concepts": [
    {{
      "title": "concept name",
      "description": "1-2 sentence description",
      "difficulty_level": 1,
      "is_fundamental": true
    }}
  ],
  "relationships": [
    {{
      "concept": "concept title",
      "prerequisite": "prerequisite title",
      "reason": "why the prerequisite is needed"
    }}
  ],
  "summary": "brief summary of the skill tree",
  "learning_path": "suggested order to learn these concepts"
}}

Rules:
1. difficulty_level ranges from 1 (foundational) to 10 (advanced specialist)
2. Mark foundational concepts with "is_fundamental": true
3. Extract ALL prerequisite relationships present in the text
4. Relationships refer to concepts by their exact titles"#
        )
    }
}

#[async_trait]
impl ConceptExtractor for LlmConceptExtractor {
    async fn extract(&self, text: &str, category_hint: Option<&str>) -> Result<ExtractionResult> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Nothing to extract from empty text".into()));
        }

        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(Self::build_prompt(text, category_hint)),
        ];
        let response = self.client.complete_json(messages).await?;
        debug!(
            model = %response.model,
            tokens = response.tokens_used,
            "Extraction response received"
        );

        parse_extraction(&response.content)
    }
}

/// Parse extraction output, tolerating code fences and surrounding prose
pub fn parse_extraction(response: &str) -> Result<ExtractionResult> {
    let json = extract_json_from_response(response);
    serde_json::from_str(&json).map_err(|e| {
        warn!(error = %e, "Extraction response is not valid JSON");
        Error::ExtractionFailed(format!("Could not parse extraction response: {}", e))
    })
}

fn extract_json_from_response(response: &str) -> String {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        if let Some(newline) = response[potential_start..].find('\n') {
            let json_start = potential_start + newline + 1;
            if let Some(end) = response[json_start..].find("```") {
                return response[json_start..json_start + end].trim().to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}'))
        && start < end
    {
        return response[start..=end].to_string();
    }

    response.trim().to_string()
}

/// Outcome of one ingest call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    #[serde(flatten)]
    pub proposal: ProposalReport,
    pub summary: String,
    pub learning_path: String,
}

/// Extract → interpolate → resolve
pub struct ConceptIngestService<S: GraphStore, E: ConceptExtractor> {
    extractor: Arc<E>,
    resolver: RelationshipProposalResolver<S>,
}

impl<S: GraphStore, E: ConceptExtractor> ConceptIngestService<S, E> {
    pub fn new(extractor: Arc<E>, resolver: RelationshipProposalResolver<S>) -> Self {
        Self {
            extractor,
            resolver,
        }
    }

    pub fn resolver(&self) -> &RelationshipProposalResolver<S> {
        &self.resolver
    }

    /// Ingest free text into the graph
    ///
    /// Extraction errors are returned before anything is written.
    pub async fn ingest(
        &self,
        text: &str,
        category_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let extraction = self.extractor.extract(text, category_hint).await?;
        info!(
            concepts = extraction.concepts.len(),
            relationships = extraction.relationships.len(),
            "Concepts extracted"
        );

        let summary = extraction.summary.clone();
        let learning_path = extraction.learning_path.clone();
        let batch = ProposalBatch::from_extraction(extraction, category_hint);
        let proposal = self.resolver.apply(batch, cancel).await?;

        Ok(IngestReport {
            proposal,
            summary,
            learning_path,
        })
    }
}
