//! Infrastructure layer
//!
//! Store implementations backing the domain traits.

pub mod graph;
