// ABOUTME: One-shot commands that run outside the API server
// ABOUTME: Executing a single task end to end and applying database migrations

use codingcat_core::{generate_event_id, validate_prompt, RunRequest};
use codingcat_storage::{DbState, RunRecord};
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::runtime::Services;

/// Result of a foreground run, ready for display
#[derive(Debug)]
pub struct RunSummary {
    pub project_id: String,
    pub run: RunRecord,
    pub content: Option<String>,
    pub sandbox_url: Option<String>,
    pub files: Vec<String>,
}

/// Execute one task in the foreground, creating the project when none is given
pub async fn run_task(config: &Config, project_id: Option<String>, task: &str) -> Result<RunSummary> {
    let services = Services::init(config).await?;
    run_task_with(&services, project_id, task).await
}

pub async fn run_task_with(
    services: &Services,
    project_id: Option<String>,
    task: &str,
) -> Result<RunSummary> {
    let task = validate_prompt(task)?;
    let db = &services.db;

    let submission = db
        .submissions
        .submit(project_id.as_deref(), task, &generate_event_id())
        .await?;
    let project = submission.project;
    let request = RunRequest {
        event_id: submission.run.id,
        task_text: submission.run.task,
        project_id: project.id.clone(),
    };
    info!(project_id = %project.id, run_id = %request.event_id, "Running task in foreground");

    let run = services.executor.process(&request).await?;

    let message = match &run.message_id {
        Some(id) => Some(db.messages.get_message(id).await?),
        None => None,
    };
    let fragment = message.as_ref().and_then(|m| m.fragment.clone());

    Ok(RunSummary {
        project_id: project.id,
        run,
        content: message.map(|m| m.content),
        sandbox_url: fragment.as_ref().map(|f| f.sandbox_url.clone()),
        files: fragment
            .map(|f| f.files.into_keys().collect())
            .unwrap_or_default(),
    })
}

/// Open the database, which applies any pending migrations
pub async fn migrate(config: &Config) -> Result<()> {
    DbState::open(&config.database_url).await?;
    info!(database_url = %config.database_url, "Migrations applied");
    Ok(())
}
