//! User progress tracking
//!
//! - **UserProgress**: completed and in-progress concept ids for one user
//! - **ProgressSnapshot**: the portable export/import format
//! - **UserProgressProjector**: available/blocked views and progress mutations

mod entity;
mod projector;
mod repository;

pub use entity::{ProgressSnapshot, UserProgress};
pub use projector::{CategoryStatistics, ProgressStatistics, UserProgressProjector};
pub use repository::ProgressStore;
