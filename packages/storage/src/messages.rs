// ABOUTME: Conversation messages and the code fragments attached to them
// ABOUTME: A fragment is written in the same transaction as its owning message

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use codingcat_core::FileMap;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::{new_id, parse_timestamp, timestamp, Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "USER",
            MessageRole::Assistant => "ASSISTANT",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USER" => Ok(MessageRole::User),
            "ASSISTANT" => Ok(MessageRole::Assistant),
            other => Err(StorageError::InvalidData(format!(
                "unknown message role: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Result,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Result => "RESULT",
            MessageType::Error => "ERROR",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RESULT" => Ok(MessageType::Result),
            "ERROR" => Ok(MessageType::Error),
            other => Err(StorageError::InvalidData(format!(
                "unknown message type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub id: String,
    pub message_id: String,
    pub sandbox_url: String,
    pub title: String,
    pub files: FileMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fragment fields supplied by the caller; ids and timestamps are assigned on insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewFragment {
    pub sandbox_url: String,
    pub title: String,
    pub files: FileMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub project_id: String,
    pub content: String,
    pub role: MessageRole,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub fragment: Option<Fragment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SELECT_MESSAGES: &str = r#"
    SELECT
        m.id, m.project_id, m.content, m.role, m.message_type, m.created_at, m.updated_at,
        f.id AS fragment_id, f.sandbox_url, f.title, f.files,
        f.created_at AS fragment_created_at, f.updated_at AS fragment_updated_at
    FROM messages m
    LEFT JOIN fragments f ON f.message_id = m.id
"#;

pub struct MessageStorage {
    pool: SqlitePool,
}

impl MessageStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_message(
        &self,
        project_id: &str,
        content: &str,
        role: MessageRole,
        message_type: MessageType,
    ) -> Result<Message> {
        self.create_message_with_fragment(project_id, content, role, message_type, None)
            .await
    }

    /// Insert a message and, when given, its fragment atomically
    pub async fn create_message_with_fragment(
        &self,
        project_id: &str,
        content: &str,
        role: MessageRole,
        message_type: MessageType,
        fragment: Option<NewFragment>,
    ) -> Result<Message> {
        let now = Utc::now();
        let message_id = new_id("msg");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, project_id, content, role, message_type, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&message_id)
        .bind(project_id)
        .bind(content)
        .bind(role.as_str())
        .bind(message_type.as_str())
        .bind(timestamp(&now))
        .bind(timestamp(&now))
        .execute(&mut *tx)
        .await?;

        let fragment = match fragment {
            Some(new_fragment) => {
                let fragment = Fragment {
                    id: new_id("frg"),
                    message_id: message_id.clone(),
                    sandbox_url: new_fragment.sandbox_url,
                    title: new_fragment.title,
                    files: new_fragment.files,
                    created_at: now,
                    updated_at: now,
                };

                sqlx::query(
                    r#"
                    INSERT INTO fragments (id, message_id, sandbox_url, title, files, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(&fragment.id)
                .bind(&fragment.message_id)
                .bind(&fragment.sandbox_url)
                .bind(&fragment.title)
                .bind(serde_json::to_string(&fragment.files)?)
                .bind(timestamp(&now))
                .bind(timestamp(&now))
                .execute(&mut *tx)
                .await?;

                Some(fragment)
            }
            None => None,
        };

        tx.commit().await?;

        debug!(
            message_id = %message_id,
            project_id = %project_id,
            has_fragment = fragment.is_some(),
            "Message stored"
        );

        Ok(Message {
            id: message_id,
            project_id: project_id.to_string(),
            content: content.to_string(),
            role,
            message_type,
            fragment,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_message(&self, id: &str) -> Result<Message> {
        let query = format!("{} WHERE m.id = ?1", SELECT_MESSAGES);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_message(&row),
            None => Err(StorageError::NotFound(format!("Message {}", id))),
        }
    }

    /// Messages of a project, oldest first, each with its fragment if any
    pub async fn list_messages(&self, project_id: &str) -> Result<Vec<Message>> {
        let query = format!(
            "{} WHERE m.project_id = ?1 ORDER BY m.created_at ASC, m.rowid ASC",
            SELECT_MESSAGES
        );
        let rows = sqlx::query(&query)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_message).collect()
    }
}

fn row_to_message(row: &SqliteRow) -> Result<Message> {
    let id: String = row.try_get("id")?;

    let fragment = match row.try_get::<Option<String>, _>("fragment_id")? {
        Some(fragment_id) => {
            let files_json: String = row.try_get("files")?;
            Some(Fragment {
                id: fragment_id,
                message_id: id.clone(),
                sandbox_url: row.try_get("sandbox_url")?,
                title: row.try_get("title")?,
                files: serde_json::from_str(&files_json)?,
                created_at: parse_timestamp(&row.try_get::<String, _>("fragment_created_at")?)?,
                updated_at: parse_timestamp(&row.try_get::<String, _>("fragment_updated_at")?)?,
            })
        }
        None => None,
    };

    Ok(Message {
        id,
        project_id: row.try_get("project_id")?,
        content: row.try_get("content")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        message_type: row.try_get::<String, _>("message_type")?.parse()?,
        fragment,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_in_memory, ProjectStorage};
    use pretty_assertions::assert_eq;

    async fn setup() -> (MessageStorage, String) {
        let pool = connect_in_memory().await.unwrap();
        let project = ProjectStorage::new(pool.clone())
            .create_project()
            .await
            .unwrap();
        (MessageStorage::new(pool), project.id)
    }

    #[tokio::test]
    async fn test_message_without_fragment() {
        let (storage, project_id) = setup().await;

        let message = storage
            .create_message(&project_id, "hello", MessageRole::User, MessageType::Result)
            .await
            .unwrap();

        let fetched = storage.get_message(&message.id).await.unwrap();
        assert_eq!(fetched.content, "hello");
        assert_eq!(fetched.role, MessageRole::User);
        assert!(fetched.fragment.is_none());
    }

    #[tokio::test]
    async fn test_message_with_fragment_roundtrips_files() {
        let (storage, project_id) = setup().await;

        let mut files = FileMap::new();
        files.insert("app/page.tsx".to_string(), "export default 1".to_string());

        let message = storage
            .create_message_with_fragment(
                &project_id,
                "done",
                MessageRole::Assistant,
                MessageType::Result,
                Some(NewFragment {
                    sandbox_url: "https://3000-abc.e2b.app".to_string(),
                    title: "Fragment".to_string(),
                    files: files.clone(),
                }),
            )
            .await
            .unwrap();

        let fetched = storage.get_message(&message.id).await.unwrap();
        let fragment = fetched.fragment.unwrap();
        assert_eq!(fragment.files, files);
        assert_eq!(fragment.sandbox_url, "https://3000-abc.e2b.app");
        assert_eq!(fragment.message_id, message.id);
    }

    #[tokio::test]
    async fn test_list_messages_oldest_first() {
        let (storage, project_id) = setup().await;

        for content in ["one", "two", "three"] {
            storage
                .create_message(&project_id, content, MessageRole::User, MessageType::Result)
                .await
                .unwrap();
        }

        let contents: Vec<String> = storage
            .list_messages(&project_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_unknown_project_is_rejected() {
        let (storage, _) = setup().await;

        let result = storage
            .create_message("prj_missing", "x", MessageRole::User, MessageType::Result)
            .await;
        assert!(matches!(result, Err(StorageError::Sqlx(_))));
    }

    #[test]
    fn test_role_and_type_parse() {
        assert_eq!("ASSISTANT".parse::<MessageRole>().unwrap(), MessageRole::Assistant);
        assert_eq!("ERROR".parse::<MessageType>().unwrap(), MessageType::Error);
        assert!("assistant".parse::<MessageRole>().is_err());
    }
}
