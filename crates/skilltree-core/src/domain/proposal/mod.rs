//! Proposal intake: candidate concepts from extraction merged into the graph

mod candidate;
mod extractor;
mod resolver;
mod rules;

pub use candidate::{
    CandidateConcept, CandidateRelationship, DEFAULT_CATEGORY, ExtractionResult, ProposalBatch,
};
pub use extractor::{
    ConceptExtractor, ConceptIngestService, IngestReport, LlmConceptExtractor, parse_extraction,
};
pub use resolver::{
    CreatedConcept, NotCommitted, NotCommittedReason, ProposalReport, RelationshipOutcome,
    RelationshipProposalResolver, RelationshipResult, TitleIndex,
};
pub use rules::{PrerequisiteRule, PrerequisiteRuleSet};
