//! Concept graph and user progress persistence

mod memory;
mod sqlite;

pub use memory::{InMemoryGraphStore, InMemoryProgressStore};
pub use sqlite::{SqliteGraphStore, SqliteProgressStore};
