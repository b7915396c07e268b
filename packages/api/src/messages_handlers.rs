// ABOUTME: HTTP handlers for a project's conversation
// ABOUTME: Posting a message enqueues a new agent run for that project

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
pub struct CreateMessageRequest {
    pub value: String,
}

/// Messages oldest first, each with its fragment when one was produced
pub async fn list_messages(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult {
    state.db.projects.get_project(&project_id).await?;
    let messages = state.db.messages.list_messages(&project_id).await?;
    Ok(ok(messages))
}

pub async fn create_message(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<CreateMessageRequest>,
) -> ApiResult {
    let value = validate_prompt(&request.value)?;

    let submission = state
        .db
        .submissions
        .submit(Some(&project_id), value, &generate_event_id())
        .await?;

    info!(
        project_id = %project_id,
        run_id = %submission.run.id,
        "Message created, run enqueued"
    );
    state.enqueue_run(submission.run).await;

    Ok(created(submission.message))
}
