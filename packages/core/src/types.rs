// ABOUTME: Domain types exchanged between the run workflow and its collaborators
// ABOUTME: Run requests, sandbox handles, file snapshots, and run outcomes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::generate_event_id;

/// Files written during a run, keyed by sandbox path.
///
/// A `BTreeMap` keeps the snapshot ordered so persisted fragments are stable.
pub type FileMap = BTreeMap<String, String>;

/// Inbound run event, `{"value": ..., "projectId": ...}` on the wire.
/// `eventId` is the idempotency key and is generated when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default = "generate_event_id")]
    pub event_id: String,
    #[serde(rename = "value")]
    pub task_text: String,
    pub project_id: String,
}

impl RunRequest {
    pub fn new(task_text: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            event_id: generate_event_id(),
            task_text: task_text.into(),
            project_id: project_id.into(),
        }
    }
}

/// Provisioned sandbox; reconnecting by id reaches the same filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxHandle {
    pub sandbox_id: String,
}

impl SandboxHandle {
    pub fn new(sandbox_id: impl Into<String>) -> Self {
        Self {
            sandbox_id: sandbox_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Result of a finished run, handed to the persistence gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: OutcomeStatus,
    pub summary_text: Option<String>,
    pub file_snapshot: FileMap,
    pub sandbox_url: String,
}

impl RunOutcome {
    /// Outcome for a run that never produced anything worth showing
    pub fn failed(sandbox_url: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            summary_text: None,
            file_snapshot: FileMap::new(),
            sandbox_url: sandbox_url.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}
