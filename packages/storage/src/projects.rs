// ABOUTME: Project records and their storage
// ABOUTME: Projects own the conversation and runs started from the web or CLI

use chrono::{DateTime, Utc};
use codingcat_core::generate_project_name;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::{new_id, parse_timestamp, timestamp, Result, StorageError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ProjectStorage {
    pool: SqlitePool,
}

impl ProjectStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a project with a generated name
    pub async fn create_project(&self) -> Result<Project> {
        self.create_named_project(&generate_project_name()).await
    }

    pub async fn create_named_project(&self, name: &str) -> Result<Project> {
        if name.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "Project name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let project = Project {
            id: new_id("prj"),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO projects (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(timestamp(&project.created_at))
        .bind(timestamp(&project.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(project)
    }

    pub async fn get_project(&self, id: &str) -> Result<Project> {
        let row = sqlx::query(
            "SELECT id, name, created_at, updated_at FROM projects WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_project(&row),
            None => Err(StorageError::NotFound(format!("Project {}", id))),
        }
    }

    /// Most recently active first
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query(
            "SELECT id, name, created_at, updated_at FROM projects ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_project).collect()
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Bump `updated_at` so the project sorts to the top of the list
    pub async fn touch(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE projects SET updated_at = ?1 WHERE id = ?2")
            .bind(timestamp(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Project {}", id)));
        }
        Ok(())
    }
}

pub(crate) fn row_to_project(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect_in_memory;

    #[tokio::test]
    async fn test_create_and_get_project() {
        let storage = ProjectStorage::new(connect_in_memory().await.unwrap());

        let created = storage.create_project().await.unwrap();
        assert!(created.id.starts_with("prj_"));
        assert!(!created.name.is_empty());

        let fetched = storage.get_project(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.name, created.name);
    }

    #[tokio::test]
    async fn test_get_missing_project() {
        let storage = ProjectStorage::new(connect_in_memory().await.unwrap());
        let err = storage.get_project("prj_missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_touch_reorders_list() {
        let storage = ProjectStorage::new(connect_in_memory().await.unwrap());

        let first = storage.create_named_project("first").await.unwrap();
        let second = storage.create_named_project("second").await.unwrap();

        let listed = storage.list_projects().await.unwrap();
        assert_eq!(listed[0].id, second.id);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.touch(&first.id).await.unwrap();

        let listed = storage.list_projects().await.unwrap();
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn test_rejects_blank_name() {
        let storage = ProjectStorage::new(connect_in_memory().await.unwrap());
        let err = storage.create_named_project("  ").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }
}
