// ABOUTME: HTTP handler exposing run status
// ABOUTME: Lets clients poll a run until it completes or fails

use axum::extract::{Path, State};

use crate::response::{ok, ApiResult};
use crate::AppState;

pub async fn get_run(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let run = state.db.runs.get_run(&id).await?;
    Ok(ok(run))
}
