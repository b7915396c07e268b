// ABOUTME: Error type for wiring up and running the CodingCat services
// ABOUTME: Library-level failures are wrapped here; the binary reports them through anyhow

use codingcat_agents::WorkflowError;
use codingcat_ai::AIServiceError;
use codingcat_core::ValidationError;
use codingcat_sandbox::ProviderError;
use codingcat_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Sandbox provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model client error: {0}")]
    Model(#[from] AIServiceError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Invalid task: {0}")]
    Validation(#[from] ValidationError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
