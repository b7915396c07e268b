// ABOUTME: HTTP handlers for projects
// ABOUTME: Creating a project stores the first user message with its run, then enqueues it

use axum::{
    extract::{Path, State},
    Json,
};
use codingcat_core::{generate_event_id, validate_prompt};
use serde::Deserialize;
use tracing::info;

use crate::response::{created, ok, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub value: String,
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult {
    let projects = state.db.projects.list_projects().await?;
    Ok(ok(projects))
}

pub async fn get_project(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let project = state.db.projects.get_project(&id).await?;
    Ok(ok(project))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult {
    let value = validate_prompt(&request.value)?;

    let submission = state
        .db
        .submissions
        .submit(None, value, &generate_event_id())
        .await?;

    info!(
        project_id = %submission.project.id,
        run_id = %submission.run.id,
        "Project created, run enqueued"
    );
    state.enqueue_run(submission.run).await;

    Ok(created(submission.project))
}

pub async fn list_project_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    state.db.projects.get_project(&id).await?;
    let runs = state.db.runs.list_runs(&id).await?;
    Ok(ok(runs))
}
