// ABOUTME: Durable memo of completed workflow steps keyed by (run id, step key)
// ABOUTME: A retried run replays saved outputs instead of repeating side effects

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::{timestamp, Result};

#[async_trait]
pub trait StepStore: Send + Sync {
    /// Saved output of a step, if it already completed for this run
    async fn load(&self, run_id: &str, step_key: &str) -> Result<Option<Value>>;

    /// Save a step output. The first saved output for a key wins.
    async fn save(&self, run_id: &str, step_key: &str, output: &Value) -> Result<()>;
}

pub struct SqliteStepStore {
    pool: SqlitePool,
}

impl SqliteStepStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of steps recorded for a run
    pub async fn count(&self, run_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM workflow_steps WHERE run_id = ?1")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl StepStore for SqliteStepStore {
    async fn load(&self, run_id: &str, step_key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT output FROM workflow_steps WHERE run_id = ?1 AND step_key = ?2",
        )
        .bind(run_id)
        .bind(step_key)
        .fetch_optional(&self.pool)
        .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, run_id: &str, step_key: &str, output: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_steps (run_id, step_key, output, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(run_id, step_key) DO NOTHING
            "#,
        )
        .bind(run_id)
        .bind(step_key)
        .bind(serde_json::to_string(output)?)
        .bind(timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Process-local step store for tests and one-shot CLI runs
#[derive(Default)]
pub struct MemoryStepStore {
    steps: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.steps.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.steps.read().await.is_empty()
    }

    /// Step keys recorded for a run, sorted
    pub async fn keys(&self, run_id: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .steps
            .read()
            .await
            .keys()
            .filter(|(run, _)| run == run_id)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StepStore for MemoryStepStore {
    async fn load(&self, run_id: &str, step_key: &str) -> Result<Option<Value>> {
        let steps = self.steps.read().await;
        Ok(steps
            .get(&(run_id.to_string(), step_key.to_string()))
            .cloned())
    }

    async fn save(&self, run_id: &str, step_key: &str, output: &Value) -> Result<()> {
        let mut steps = self.steps.write().await;
        steps
            .entry((run_id.to_string(), step_key.to_string()))
            .or_insert_with(|| output.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect_in_memory;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_store_first_write_wins() {
        let store = SqliteStepStore::new(connect_in_memory().await.unwrap());

        assert_eq!(store.load("run_1", "get-sandbox-id").await.unwrap(), None);

        store
            .save("run_1", "get-sandbox-id", &json!("sbx-1"))
            .await
            .unwrap();
        store
            .save("run_1", "get-sandbox-id", &json!("sbx-2"))
            .await
            .unwrap();

        assert_eq!(
            store.load("run_1", "get-sandbox-id").await.unwrap(),
            Some(json!("sbx-1"))
        );
        assert_eq!(store.count("run_1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_scopes_by_run() {
        let store = SqliteStepStore::new(connect_in_memory().await.unwrap());

        store.save("run_1", "terminal#1", &json!("a")).await.unwrap();
        assert_eq!(store.load("run_2", "terminal#1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_keys() {
        let store = MemoryStepStore::new();
        store.save("run_1", "readFiles#1", &json!([])).await.unwrap();
        store.save("run_1", "code-agent#1", &json!({})).await.unwrap();
        store.save("run_2", "code-agent#1", &json!({})).await.unwrap();

        assert_eq!(store.keys("run_1").await, vec!["code-agent#1", "readFiles#1"]);
        assert_eq!(store.len().await, 3);
    }
}
