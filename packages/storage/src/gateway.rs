// ABOUTME: Persistence gateway that turns a run outcome into a stored assistant message
// ABOUTME: Error outcomes store an advisory message, successes store the summary with a fragment

use std::sync::Arc;

use async_trait::async_trait;
use codingcat_core::{RunOutcome, ERROR_ADVISORY_MESSAGE, FRAGMENT_TITLE};
use tracing::{info, warn};

use crate::messages::{Message, MessageRole, MessageStorage, MessageType, NewFragment};
use crate::projects::ProjectStorage;
use crate::Result;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Store the outcome of a run as one assistant message for the project
    async fn persist(&self, project_id: &str, outcome: &RunOutcome) -> Result<Message>;
}

/// Gateway backed by the message and project tables
pub struct SqlitePersistenceGateway {
    messages: Arc<MessageStorage>,
    projects: Arc<ProjectStorage>,
}

impl SqlitePersistenceGateway {
    pub fn new(messages: Arc<MessageStorage>, projects: Arc<ProjectStorage>) -> Self {
        Self { messages, projects }
    }
}

#[async_trait]
impl PersistenceGateway for SqlitePersistenceGateway {
    async fn persist(&self, project_id: &str, outcome: &RunOutcome) -> Result<Message> {
        let message = if outcome.is_error() {
            self.messages
                .create_message(
                    project_id,
                    ERROR_ADVISORY_MESSAGE,
                    MessageRole::Assistant,
                    MessageType::Error,
                )
                .await?
        } else {
            let fragment = NewFragment {
                sandbox_url: outcome.sandbox_url.clone(),
                title: FRAGMENT_TITLE.to_string(),
                files: outcome.file_snapshot.clone(),
            };
            self.messages
                .create_message_with_fragment(
                    project_id,
                    outcome.summary_text.as_deref().unwrap_or_default(),
                    MessageRole::Assistant,
                    MessageType::Result,
                    Some(fragment),
                )
                .await?
        };

        if let Err(e) = self.projects.touch(project_id).await {
            warn!("Failed to bump project {} activity: {}", project_id, e);
        }

        info!(
            project_id = %project_id,
            message_id = %message.id,
            message_type = %message.message_type,
            "Run outcome persisted"
        );

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbState;
    use codingcat_core::{FileMap, OutcomeStatus};
    use pretty_assertions::assert_eq;

    async fn setup() -> (SqlitePersistenceGateway, DbState, String) {
        let db = DbState::in_memory().await.unwrap();
        let project = db.projects.create_project().await.unwrap();
        let gateway = SqlitePersistenceGateway::new(db.messages.clone(), db.projects.clone());
        (gateway, db, project.id)
    }

    #[tokio::test]
    async fn test_success_outcome_stores_fragment() {
        let (gateway, db, project_id) = setup().await;

        let mut files = FileMap::new();
        files.insert("app/page.tsx".to_string(), "<div/>".to_string());
        let outcome = RunOutcome {
            status: OutcomeStatus::Success,
            summary_text: Some("<task_summary>Built it</task_summary>".to_string()),
            file_snapshot: files.clone(),
            sandbox_url: "https://3000-sbx.e2b.app".to_string(),
        };

        let message = gateway.persist(&project_id, &outcome).await.unwrap();
        assert_eq!(message.content, "<task_summary>Built it</task_summary>");
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.message_type, MessageType::Result);

        let stored = db.messages.list_messages(&project_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        let fragment = stored[0].fragment.as_ref().unwrap();
        assert_eq!(fragment.title, "Fragment");
        assert_eq!(fragment.sandbox_url, "https://3000-sbx.e2b.app");
        assert_eq!(fragment.files, files);
    }

    #[tokio::test]
    async fn test_error_outcome_stores_advisory_only() {
        let (gateway, db, project_id) = setup().await;

        let outcome = RunOutcome::failed("https://3000-sbx.e2b.app");
        let message = gateway.persist(&project_id, &outcome).await.unwrap();

        assert_eq!(message.content, "Something went wrong. Please try again.");
        assert_eq!(message.message_type, MessageType::Error);

        let stored = db.messages.list_messages(&project_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].fragment.is_none());
    }
}
