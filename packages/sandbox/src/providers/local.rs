// ABOUTME: Local provider running sandboxes as plain directories on the host
// ABOUTME: Intended for development without E2B; offers no isolation beyond the working directory

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{CommandFailure, CommandOutput, ProviderError, Result, SandboxProvider};

pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sandbox_dir(&self, sandbox_id: &str) -> Result<PathBuf> {
        let valid = !sandbox_id.is_empty()
            && sandbox_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ProviderError::NotFound(sandbox_id.to_string()));
        }
        Ok(self.root.join(sandbox_id))
    }

    async fn existing_sandbox_dir(&self, sandbox_id: &str) -> Result<PathBuf> {
        let dir = self.sandbox_dir(sandbox_id)?;
        if tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            Ok(dir)
        } else {
            Err(ProviderError::NotFound(sandbox_id.to_string()))
        }
    }

    /// Map a sandbox path onto the host, keeping it inside the sandbox directory
    fn resolve(&self, dir: &Path, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = dir.to_path_buf();
        let mut depth = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ProviderError::InvalidPath(path.to_string()));
                }
            }
        }

        if depth == 0 {
            return Err(ProviderError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl SandboxProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn create(&self, template: &str) -> Result<String> {
        let sandbox_id = format!("local-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let dir = self.sandbox_dir(&sandbox_id)?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProviderError::ProvisionFailed(format!("{}: {}", dir.display(), e)))?;

        info!(sandbox_id = %sandbox_id, template = %template, path = %dir.display(), "Local sandbox created");
        Ok(sandbox_id)
    }

    async fn connect(&self, sandbox_id: &str) -> Result<()> {
        self.existing_sandbox_dir(sandbox_id).await.map(|_| ())
    }

    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
    ) -> std::result::Result<CommandOutput, CommandFailure> {
        let dir = self.existing_sandbox_dir(sandbox_id).await?;
        debug!(sandbox_id = %sandbox_id, command = %command, "Running local command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ProviderError::from)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutput {
                stdout,
                stderr,
                exit_code: 0,
            })
        } else {
            let error = match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            Err(CommandFailure::new(error, stdout, stderr))
        }
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<()> {
        let dir = self.existing_sandbox_dir(sandbox_id).await?;
        let target = self.resolve(&dir, path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| ProviderError::FileError(format!("failed to write {}: {}", path, e)))
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String> {
        let dir = self.existing_sandbox_dir(sandbox_id).await?;
        let target = self.resolve(&dir, path)?;

        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| ProviderError::FileError(format!("failed to read {}: {}", path, e)))
    }

    fn get_host(&self, _sandbox_id: &str, port: u16) -> String {
        format!("localhost:{}", port)
    }

    fn public_url(&self, sandbox_id: &str, port: u16) -> String {
        format!("http://{}", self.get_host(sandbox_id, port))
    }
}
