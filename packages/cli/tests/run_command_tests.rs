// ABOUTME: Foreground run command against the local sandbox and a scripted model
// ABOUTME: Checks the project, messages, files on disk, and the printed summary data

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codingcat_ai::{AIServiceResult, ContentBlock, ModelClient, ModelRequest, ModelResponse, Usage};
use codingcat_cli::commands::run_task_with;
use codingcat_cli::config::{ModelSettings, SandboxSettings};
use codingcat_cli::{CliError, Config, Services};
use codingcat_sandbox::{LocalProvider, ProviderKind};
use codingcat_storage::{DbState, MessageRole, RunStatus};
use pretty_assertions::assert_eq;
use serde_json::json;

struct ScriptedModel {
    turns: Mutex<VecDeque<Vec<ContentBlock>>>,
}

impl ScriptedModel {
    fn new(turns: Vec<Vec<ContentBlock>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, _request: &ModelRequest) -> AIServiceResult<ModelResponse> {
        let content = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![ContentBlock::text("Still working.")]);
        Ok(ModelResponse {
            content,
            stop_reason: None,
            usage: Usage::default(),
        })
    }
}

fn test_config(root: PathBuf) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 4001,
        cors_origin: "http://localhost:3000".to_string(),
        database_url: "sqlite::memory:".to_string(),
        sandbox: SandboxSettings {
            provider: ProviderKind::Local,
            template: "vibe-next-testing".to_string(),
            e2b: None,
            local_root: root,
        },
        model: ModelSettings {
            api_key: None,
            model: None,
            api_url: None,
        },
        max_iterations: 4,
        max_attempts: 1,
        retry_base_delay: Duration::from_millis(1),
        max_concurrent_runs: 1,
        queue_capacity: 8,
    }
}

async fn services(root: &tempfile::TempDir, model: ScriptedModel) -> Services {
    let config = test_config(root.path().to_path_buf());
    let db = DbState::in_memory().await.unwrap();
    let provider = Arc::new(LocalProvider::new(root.path()));
    Services::with_parts(db, provider, Arc::new(model), &config)
}

#[tokio::test]
async fn test_run_creates_project_and_writes_files() {
    let root = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        vec![ContentBlock::ToolUse {
            id: "t1".to_string(),
            name: "createOrUpdateFiles".to_string(),
            input: json!({"files": [{"path": "app/page.tsx", "content": "export default 1"}]}),
        }],
        vec![ContentBlock::text("<task_summary>Added the page</task_summary>")],
    ]);
    let services = services(&root, model).await;

    let summary = run_task_with(&services, None, "add a page").await.unwrap();

    assert_eq!(summary.run.status, RunStatus::Completed);
    assert_eq!(
        summary.content.as_deref(),
        Some("<task_summary>Added the page</task_summary>")
    );
    assert_eq!(summary.files, vec!["app/page.tsx".to_string()]);
    assert!(summary.sandbox_url.unwrap().starts_with("http://localhost:3000"));

    let messages = services
        .db
        .messages
        .list_messages(&summary.project_id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);

    let written: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
    assert_eq!(written.len(), 1);
}

#[tokio::test]
async fn test_run_without_summary_reports_advisory() {
    let root = tempfile::tempdir().unwrap();
    let services = services(&root, ScriptedModel::new(vec![])).await;
    let project = services.db.projects.create_project().await.unwrap();

    let summary = run_task_with(&services, Some(project.id.clone()), "do something")
        .await
        .unwrap();

    assert_eq!(summary.project_id, project.id);
    assert_eq!(summary.run.status, RunStatus::Completed);
    assert_eq!(
        summary.content.as_deref(),
        Some("Something went wrong. Please try again.")
    );
    assert!(summary.sandbox_url.is_none());
    assert!(summary.files.is_empty());
}

#[tokio::test]
async fn test_run_rejects_unknown_project_and_blank_task() {
    let root = tempfile::tempdir().unwrap();
    let services = services(&root, ScriptedModel::new(vec![])).await;

    let err = run_task_with(&services, Some("nope".to_string()), "task")
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Storage(_)));
    assert!(services.db.runs.list_runs("nope").await.unwrap().is_empty());

    let err = run_task_with(&services, None, "  ").await.unwrap_err();
    assert!(matches!(err, CliError::Validation(_)));
    assert!(services.db.projects.list_projects().await.unwrap().is_empty());
}
