// ABOUTME: Atomic intake of a user task: project, USER message, and queued run together
// ABOUTME: A crash or failed insert never leaves a message without the run that answers it

use chrono::Utc;
use codingcat_core::generate_project_name;
use sqlx::SqlitePool;
use tracing::debug;

use crate::messages::{Message, MessageRole, MessageType};
use crate::projects::{row_to_project, Project};
use crate::runs::{RunRecord, RunStatus};
use crate::{new_id, timestamp, Result, StorageError};

/// Everything written for one accepted task
#[derive(Debug, Clone)]
pub struct Submission {
    pub project: Project,
    pub message: Message,
    pub run: RunRecord,
}

pub struct SubmissionStorage {
    pool: SqlitePool,
}

impl SubmissionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store the task as a USER message and register its queued run in one transaction.
    /// Without `project_id` a project with a generated name is created first.
    pub async fn submit(
        &self,
        project_id: Option<&str>,
        content: &str,
        run_id: &str,
    ) -> Result<Submission> {
        let now = Utc::now();
        let stamp = timestamp(&now);

        let mut tx = self.pool.begin().await?;

        let project = match project_id {
            Some(id) => {
                let row = sqlx::query(
                    r#"
                    UPDATE projects SET updated_at = ?1 WHERE id = ?2
                    RETURNING id, name, created_at, updated_at
                    "#,
                )
                .bind(&stamp)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

                match row {
                    Some(row) => row_to_project(&row)?,
                    None => return Err(StorageError::NotFound(format!("Project {}", id))),
                }
            }
            None => {
                let project = Project {
                    id: new_id("prj"),
                    name: generate_project_name(),
                    created_at: now,
                    updated_at: now,
                };
                sqlx::query(
                    "INSERT INTO projects (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                )
                .bind(&project.id)
                .bind(&project.name)
                .bind(&stamp)
                .execute(&mut *tx)
                .await?;
                project
            }
        };

        let message = Message {
            id: new_id("msg"),
            project_id: project.id.clone(),
            content: content.to_string(),
            role: MessageRole::User,
            message_type: MessageType::Result,
            fragment: None,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO messages (id, project_id, content, role, message_type, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&message.id)
        .bind(&message.project_id)
        .bind(&message.content)
        .bind(message.role.as_str())
        .bind(message.message_type.as_str())
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO runs (id, project_id, task, status, attempts, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'queued', 0, ?4, ?4)
            "#,
        )
        .bind(run_id)
        .bind(&project.id)
        .bind(content)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StorageError::InvalidInput(format!(
                "Run {} already exists",
                run_id
            )));
        }

        tx.commit().await?;

        debug!(
            project_id = %project.id,
            message_id = %message.id,
            run_id = %run_id,
            "Task submitted"
        );

        let run = RunRecord {
            id: run_id.to_string(),
            project_id: project.id.clone(),
            task: content.to_string(),
            status: RunStatus::Queued,
            attempts: 0,
            error: None,
            message_id: None,
            created_at: now,
            updated_at: now,
        };

        Ok(Submission {
            project,
            message,
            run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbState;

    #[tokio::test]
    async fn test_submit_creates_project_message_and_run() {
        let db = DbState::in_memory().await.unwrap();

        let submission = db
            .submissions
            .submit(None, "build a todo app", "evt_1")
            .await
            .unwrap();

        let project = db.projects.get_project(&submission.project.id).await.unwrap();
        assert_eq!(project.name, submission.project.name);

        let messages = db.messages.list_messages(&project.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, submission.message.id);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "build a todo app");

        let run = db.runs.get_run("evt_1").await.unwrap();
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.project_id, project.id);
        assert_eq!(run.task, "build a todo app");
    }

    #[tokio::test]
    async fn test_submit_to_missing_project_writes_nothing() {
        let db = DbState::in_memory().await.unwrap();

        let err = db
            .submissions
            .submit(Some("prj_missing"), "hello", "evt_1")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(matches!(
            db.runs.get_run("evt_1").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_run_rolls_back_message() {
        let db = DbState::in_memory().await.unwrap();
        let project = db.projects.create_project().await.unwrap();

        db.submissions
            .submit(Some(&project.id), "first", "evt_1")
            .await
            .unwrap();
        let err = db
            .submissions
            .submit(Some(&project.id), "second", "evt_1")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::InvalidInput(_)));
        let messages = db.messages.list_messages(&project.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "first");
    }
}
