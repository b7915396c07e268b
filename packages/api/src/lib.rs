// ABOUTME: HTTP API layer for CodingCat providing REST endpoints and routing
// ABOUTME: Integration layer over storage and the run dispatcher

use axum::{routing::get, Router};

use codingcat_agents::RunDispatcher;
use codingcat_storage::{DbState, RunRecord};
use tracing::warn;

pub mod health;
pub mod messages_handlers;
pub mod projects_handlers;
pub mod response;
pub mod runs_handlers;

pub use response::{ApiError, ApiResponse};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub dispatcher: RunDispatcher,
}

impl AppState {
    pub fn new(db: DbState, dispatcher: RunDispatcher) -> Self {
        Self { db, dispatcher }
    }

    /// Hand a stored run to the dispatcher. If that fails the run stays
    /// `queued` and resumes on the next start.
    pub async fn enqueue_run(&self, run: RunRecord) {
        let run_id = run.id.clone();
        if let Err(e) = self.dispatcher.enqueue_run(run).await {
            warn!(run_id = %run_id, "Run left queued for the next start: {}", e);
        }
    }
}

/// Creates the projects API router (nested under /api/projects)
pub fn create_projects_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(projects_handlers::list_projects).post(projects_handlers::create_project),
        )
        .route("/{id}", get(projects_handlers::get_project))
        .route(
            "/{id}/messages",
            get(messages_handlers::list_messages).post(messages_handlers::create_message),
        )
        .route("/{id}/runs", get(projects_handlers::list_project_runs))
}

/// Creates the runs API router (nested under /api/runs)
pub fn create_runs_router() -> Router<AppState> {
    Router::new().route("/{id}", get(runs_handlers::get_run))
}

/// Full API router with state applied
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .nest("/api/projects", create_projects_router())
        .nest("/api/runs", create_runs_router())
        .with_state(state)
}
