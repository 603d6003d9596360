//! SQLite storage
//!
//! [`Database::open`] creates the file if needed and migrates it to
//! [`CURRENT_VERSION`] before handing out the pool.

pub mod database;
pub mod migrations;

pub use database::Database;
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
