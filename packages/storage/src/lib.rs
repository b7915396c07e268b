// ABOUTME: SQLite persistence for projects, messages, fragments, runs, and workflow steps
// ABOUTME: Exposes the persistence gateway the run workflow writes its outcome through

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

pub mod db;
pub mod gateway;
pub mod messages;
pub mod projects;
pub mod runs;
pub mod steps;
pub mod submissions;

pub use db::{connect, connect_in_memory, run_migrations, DbState};
pub use gateway::{PersistenceGateway, SqlitePersistenceGateway};
pub use messages::{Fragment, Message, MessageRole, MessageStorage, MessageType, NewFragment};
pub use projects::{Project, ProjectStorage};
pub use runs::{RunRecord, RunStatus, RunStorage};
pub use steps::{MemoryStepStore, SqliteStepStore, StepStore};
pub use submissions::{Submission, SubmissionStorage};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Fixed-width RFC 3339 so text ordering in SQLite matches time ordering
pub(crate) fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("bad timestamp '{}': {}", raw, e)))
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip_is_fixed_width() {
        let now = Utc::now();
        let raw = timestamp(&now);
        assert!(raw.ends_with('Z'));
        assert_eq!(raw.len(), "2025-01-01T00:00:00.000000Z".len());

        let parsed = parse_timestamp(&raw).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StorageError::InvalidData(_))
        ));
    }
}
