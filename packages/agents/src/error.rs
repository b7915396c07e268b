// ABOUTME: Error type for the agent run workflow and dispatcher
// ABOUTME: Tool failures never appear here; they are returned to the model as text

use codingcat_ai::AIServiceError;
use codingcat_sandbox::ProviderError;
use codingcat_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Sandbox provisioning failed: {0}")]
    Provision(#[source] ProviderError),

    #[error("Sandbox unavailable: {0}")]
    Sandbox(#[source] ProviderError),

    #[error("Model call failed: {0}")]
    Model(#[from] AIServiceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cached output of step '{key}' is unreadable: {source}")]
    StepDecode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Output of step '{key}' cannot be saved: {source}")]
    StepEncode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Run queue error: {0}")]
    Queue(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
