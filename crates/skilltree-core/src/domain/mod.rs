//! Domain layer
//!
//! Concepts, the dependency graph engine, proposal intake and learner progress.

pub mod concept;
pub mod graph;
pub mod progress;
pub mod proposal;
