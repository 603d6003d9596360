//! Opening the SQLite file that backs the graph and progress stores

use crate::storage::migrations;
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};

/// Pool size for file databases. Writes still serialize inside SQLite.
const FILE_POOL_SIZE: u32 = 5;

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    /// A private database that lives as long as the pool
    Memory,
}

/// Migrated connection pool over one skilltree database
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    location: Location,
}

impl Database {
    /// Open (or create) the database file at `path` and bring its schema up to date
    ///
    /// Missing parent directories are created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty())
            && !dir.exists()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        Self::connect(options, FILE_POOL_SIZE, Location::File(path)).await
    }

    /// A throwaway database, used by tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .journal_mode(SqliteJournalMode::Memory)
            .foreign_keys(true);

        // A second connection would see a different empty database
        Self::connect(options, 1, Location::Memory).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        pool_size: u32,
        location: Location,
    ) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect_with(options)
            .await
            .with_context(|| format!("Cannot open database {:?}", location))?;

        let db = Self { pool, location };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool)
            .await
            .context("Schema migration failed")
    }

    pub async fn migration_status(&self) -> Result<migrations::MigrationStatus> {
        migrations::migration_status(&self.pool)
            .await
            .context("Cannot read schema version")
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database did not answer")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// File backing the database; `:memory:` for in-memory ones
    pub fn path(&self) -> &Path {
        match &self.location {
            Location::File(path) => path,
            Location::Memory => Path::new(":memory:"),
        }
    }
}
