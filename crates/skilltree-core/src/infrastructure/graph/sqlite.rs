//! SQLite implementations of the graph and progress stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::concept::{Concept, GraphStore};
use crate::domain::progress::{ProgressStore, UserProgress};
use crate::error::{Error, Result};

/// SQLite-backed concept graph
#[derive(Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn get(&self, id: &str) -> Result<Option<Concept>> {
        let row: Option<ConceptRow> = sqlx::query_as("SELECT * FROM concepts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_concept()).transpose()
    }

    async fn list(&self, category: Option<&str>) -> Result<Vec<Concept>> {
        let rows: Vec<ConceptRow> = match category {
            Some(category) => {
                sqlx::query_as(
                    "SELECT * FROM concepts WHERE category = ? ORDER BY difficulty ASC, id ASC",
                )
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM concepts ORDER BY difficulty ASC, id ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(|r| r.into_concept()).collect()
    }

    async fn search(&self, query: &str, category: Option<&str>) -> Result<Vec<Concept>> {
        let rows: Vec<ConceptRow> = sqlx::query_as(
            r#"
            SELECT * FROM concepts
            WHERE (instr(lower(title), ?1) > 0 OR instr(lower(description), ?1) > 0)
              AND (?2 IS NULL OR category = ?2)
            ORDER BY difficulty ASC, id ASC
            "#,
        )
        .bind(query.to_lowercase())
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_concept()).collect()
    }

    async fn upsert(&self, concept: &Concept) -> Result<Concept> {
        let prerequisite_ids = serde_json::to_string(&concept.prerequisite_ids)?;
        let edge_reasons = serde_json::to_string(&concept.edge_reasons)?;

        let result = sqlx::query(
            r#"
            INSERT INTO concepts (
                id, title, description, category, difficulty,
                prerequisite_ids, edge_reasons, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&concept.id)
        .bind(&concept.title)
        .bind(&concept.description)
        .bind(&concept.category)
        .bind(concept.difficulty as i64)
        .bind(&prerequisite_ids)
        .bind(&edge_reasons)
        .bind(concept.created_at.to_rfc3339())
        .bind(concept.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(concept_id = %concept.id, "Concept inserted");
            return Ok(concept.clone());
        }

        debug!(concept_id = %concept.id, "Concept already present");
        self.get(&concept.id)
            .await?
            .ok_or_else(|| Error::ConceptNotFound(concept.id.clone()))
    }

    async fn save(&self, concept: &Concept) -> Result<()> {
        let prerequisite_ids = serde_json::to_string(&concept.prerequisite_ids)?;
        let edge_reasons = serde_json::to_string(&concept.edge_reasons)?;

        let result = sqlx::query(
            r#"
            UPDATE concepts SET
                title = ?,
                description = ?,
                category = ?,
                difficulty = ?,
                prerequisite_ids = ?,
                edge_reasons = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&concept.title)
        .bind(&concept.description)
        .bind(&concept.category)
        .bind(concept.difficulty as i64)
        .bind(&prerequisite_ids)
        .bind(&edge_reasons)
        .bind(concept.updated_at.to_rfc3339())
        .bind(&concept.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ConceptNotFound(concept.id.clone()));
        }

        debug!(concept_id = %concept.id, "Concept saved");
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT category FROM concepts ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }
}

#[derive(Debug, FromRow)]
struct ConceptRow {
    id: String,
    title: String,
    description: String,
    category: String,
    difficulty: i64,
    prerequisite_ids: String,
    edge_reasons: String,
    created_at: String,
    updated_at: String,
}

impl ConceptRow {
    fn into_concept(self) -> Result<Concept> {
        let prerequisite_ids = serde_json::from_str(&self.prerequisite_ids).map_err(|e| {
            Error::Other(format!(
                "Corrupt prerequisite list for concept '{}': {}",
                self.id, e
            ))
        })?;
        let edge_reasons = serde_json::from_str(&self.edge_reasons).map_err(|e| {
            Error::Other(format!("Corrupt edge reasons for concept '{}': {}", self.id, e))
        })?;

        Ok(Concept {
            difficulty: u32::try_from(self.difficulty.max(1)).unwrap_or(u32::MAX),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            prerequisite_ids,
            edge_reasons,
        })
    }
}

/// SQLite-backed user progress
#[derive(Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserProgress>> {
        let row: Option<ProgressRow> =
            sqlx::query_as("SELECT user_id, completed, in_progress FROM user_progress WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_progress()).transpose()
    }

    async fn save(&self, progress: &UserProgress) -> Result<()> {
        let completed = serde_json::to_string(&progress.completed)?;
        let in_progress = serde_json::to_string(&progress.in_progress)?;

        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, completed, in_progress, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                completed = excluded.completed,
                in_progress = excluded.in_progress,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&progress.user_id)
        .bind(&completed)
        .bind(&in_progress)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(user_id = %progress.user_id, "Progress saved");
        Ok(())
    }

    async fn learners_of(&self, concept_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT user_id FROM user_progress
            WHERE EXISTS (SELECT 1 FROM json_each(completed) WHERE value = ?1)
               OR EXISTS (SELECT 1 FROM json_each(in_progress) WHERE value = ?1)
            ORDER BY user_id
            "#,
        )
        .bind(concept_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }
}

#[derive(Debug, FromRow)]
struct ProgressRow {
    user_id: String,
    completed: String,
    in_progress: String,
}

impl ProgressRow {
    fn into_progress(self) -> Result<UserProgress> {
        Ok(UserProgress {
            completed: serde_json::from_str(&self.completed)?,
            in_progress: serde_json::from_str(&self.in_progress)?,
            user_id: self.user_id,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid timestamp '{}': {}", value, e)))
}
