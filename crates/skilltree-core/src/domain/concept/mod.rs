//! Concept graph data model
//!
//! - **Concept**: a node, identified by a slug of its title
//! - **PrerequisiteEdge**: a directed edge stored on the dependent concept
//! - **GraphStore**: persistence boundary for both

mod entity;
mod repository;

pub use entity::{Concept, MAX_CONCEPT_ID_LEN, PrerequisiteEdge, slugify};
pub use repository::GraphStore;
