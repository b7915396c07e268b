// ABOUTME: Connection pool setup and embedded migrations
// ABOUTME: DbState bundles every storage handle the API and workflow share

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::messages::MessageStorage;
use crate::projects::ProjectStorage;
use crate::runs::RunStorage;
use crate::steps::SqliteStepStore;
use crate::submissions::SubmissionStorage;
use crate::Result;

/// Open (creating if missing) the database at `database_url` and apply migrations
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    info!("Database ready at {}", database_url);

    Ok(pool)
}

/// Single-connection in-memory database, used by tests and dry runs.
/// The connection is never recycled because the data lives only inside it.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Shared handles to every table-level storage
#[derive(Clone)]
pub struct DbState {
    pub pool: SqlitePool,
    pub projects: Arc<ProjectStorage>,
    pub messages: Arc<MessageStorage>,
    pub runs: Arc<RunStorage>,
    pub steps: Arc<SqliteStepStore>,
    pub submissions: Arc<SubmissionStorage>,
}

impl DbState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            projects: Arc::new(ProjectStorage::new(pool.clone())),
            messages: Arc::new(MessageStorage::new(pool.clone())),
            runs: Arc::new(RunStorage::new(pool.clone())),
            steps: Arc::new(SqliteStepStore::new(pool.clone())),
            submissions: Arc::new(SubmissionStorage::new(pool.clone())),
            pool,
        }
    }

    pub async fn open(database_url: &str) -> Result<Self> {
        Ok(Self::new(connect(database_url).await?))
    }

    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(connect_in_memory().await?))
    }
}
