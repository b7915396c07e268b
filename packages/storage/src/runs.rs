// ABOUTME: Run records tracking each inbound run event through the dispatcher
// ABOUTME: The run id doubles as the event idempotency key

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::{parse_timestamp, timestamp, Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(StorageError::InvalidData(format!(
                "unknown run status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub project_id: String,
    pub task: String,
    pub status: RunStatus,
    pub attempts: i64,
    pub error: Option<String>,
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str =
    "id, project_id, task, status, attempts, error, message_id, created_at, updated_at";

pub struct RunStorage {
    pool: SqlitePool,
}

impl RunStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a run. Returns `false` if a run with this id already exists.
    pub async fn create_run(&self, id: &str, project_id: &str, task: &str) -> Result<bool> {
        let now = timestamp(&Utc::now());
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO runs (id, project_id, task, status, attempts, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'queued', 0, ?4, ?4)
            "#,
        )
        .bind(id)
        .bind(project_id)
        .bind(task)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_run(&self, id: &str) -> Result<RunRecord> {
        let query = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_run(&row),
            None => Err(StorageError::NotFound(format!("Run {}", id))),
        }
    }

    pub async fn list_runs(&self, project_id: &str) -> Result<Vec<RunRecord>> {
        let query = format!(
            "SELECT {} FROM runs WHERE project_id = ?1 ORDER BY created_at DESC",
            RUN_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_run).collect()
    }

    /// Runs that never reached a terminal state, oldest first. Used to resume work after a restart.
    pub async fn list_unfinished(&self) -> Result<Vec<RunRecord>> {
        let query = format!(
            "SELECT {} FROM runs WHERE status IN ('queued', 'running') ORDER BY created_at ASC, rowid ASC",
            RUN_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_run).collect()
    }

    /// Start a new attempt and return the attempt number
    pub async fn mark_running(&self, id: &str) -> Result<i64> {
        let attempts: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE runs SET status = 'running', attempts = attempts + 1, updated_at = ?1
            WHERE id = ?2
            RETURNING attempts
            "#,
        )
        .bind(timestamp(&Utc::now()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        attempts.ok_or_else(|| StorageError::NotFound(format!("Run {}", id)))
    }

    /// Record a failed attempt that will be retried
    pub async fn record_attempt_error(&self, id: &str, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'queued', error = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(error)
        .bind(timestamp(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Run {}", id)));
        }
        Ok(())
    }

    pub async fn mark_completed(&self, id: &str, message_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'completed', message_id = ?1, error = NULL, updated_at = ?2 WHERE id = ?3",
        )
        .bind(message_id)
        .bind(timestamp(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Run {}", id)));
        }
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str, message_id: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'failed', error = ?1, message_id = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(error)
        .bind(message_id)
        .bind(timestamp(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Run {}", id)));
        }
        Ok(())
    }
}

fn row_to_run(row: &SqliteRow) -> Result<RunRecord> {
    Ok(RunRecord {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        task: row.try_get("task")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        attempts: row.try_get("attempts")?,
        error: row.try_get("error")?,
        message_id: row.try_get("message_id")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}
