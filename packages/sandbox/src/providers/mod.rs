// ABOUTME: Provider trait and implementations for sandbox execution backends
// ABOUTME: Defines the capability interface the agent tools run against

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod e2b;
pub mod envelope;
pub mod local;

pub use e2b::{E2BConfig, E2BProvider};
pub use local::LocalProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to provision sandbox: {0}")]
    ProvisionFailed(String),

    #[error("Sandbox not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("File error: {0}")]
    FileError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Output of a command that exited successfully
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A command that failed, with whatever output it produced before failing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error}")]
pub struct CommandFailure {
    pub error: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailure {
    pub fn new(error: impl Into<String>, stdout: String, stderr: String) -> Self {
        Self {
            error: error.into(),
            stdout,
            stderr,
        }
    }
}

impl From<ProviderError> for CommandFailure {
    fn from(err: ProviderError) -> Self {
        Self::new(err.to_string(), String::new(), String::new())
    }
}

/// Capability interface over a remote or local sandbox
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Allocate a new sandbox from `template` and return its id
    async fn create(&self, template: &str) -> Result<String>;

    /// Check that an existing sandbox is reachable. Never allocates.
    async fn connect(&self, sandbox_id: &str) -> Result<()>;

    /// Run a shell command inside the sandbox
    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
    ) -> std::result::Result<CommandOutput, CommandFailure>;

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<()>;

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String>;

    /// Host name under which `port` inside the sandbox is exposed
    fn get_host(&self, sandbox_id: &str, port: u16) -> String;

    /// Public URL for `port` inside the sandbox
    fn public_url(&self, sandbox_id: &str, port: u16) -> String {
        format!("https://{}", self.get_host(sandbox_id, port))
    }
}

/// Which sandbox backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    E2B,
    Local,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::E2B => f.write_str("e2b"),
            ProviderKind::Local => f.write_str("local"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e2b" => Ok(ProviderKind::E2B),
            "local" => Ok(ProviderKind::Local),
            other => Err(ProviderError::ConfigError(format!(
                "unknown sandbox provider '{}' (expected 'e2b' or 'local')",
                other
            ))),
        }
    }
}
