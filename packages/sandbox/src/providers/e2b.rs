// ABOUTME: E2B provider for secure cloud sandboxes over the REST API and envd
// ABOUTME: Sandboxes are created by template; files and processes go through envd

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::envelope::{self, Decoder};
use super::{CommandFailure, CommandOutput, ProviderError, Result, SandboxProvider};

pub const DEFAULT_API_URL: &str = "https://api.e2b.app";
pub const DEFAULT_DOMAIN: &str = "e2b.app";
const ENVD_PORT: u16 = 49983;
const ENVD_USER: &str = "user";
const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 300;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct E2BConfig {
    pub api_key: String,
    pub api_url: String,
    pub domain: String,
    /// Seconds the sandbox stays alive after creation
    pub sandbox_timeout_secs: u64,
    /// Fixed envd endpoint, for debug sandboxes running on localhost
    pub envd_url: Option<String>,
}

impl E2BConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            sandbox_timeout_secs: DEFAULT_SANDBOX_TIMEOUT_SECS,
            envd_url: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateSandboxRequest<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct SandboxResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
    #[serde(rename = "envdAccessToken", default)]
    envd_access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    event: Option<ProcessEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessEvent {
    #[serde(default)]
    data: Option<DataEvent>,
    #[serde(default)]
    end: Option<EndEvent>,
}

#[derive(Debug, Deserialize)]
struct DataEvent {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndEvent {
    #[serde(default)]
    exit_code: i32,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EndStreamMessage {
    #[serde(default)]
    error: Option<ConnectError>,
}

#[derive(Debug, Deserialize)]
struct ConnectError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// envd token of a sandbox, kept only while the sandbox can still be alive
struct AccessToken {
    token: String,
    expires_at: Instant,
}

pub struct E2BProvider {
    config: E2BConfig,
    client: Client,
    access_tokens: RwLock<HashMap<String, AccessToken>>,
}

impl E2BProvider {
    pub fn new(config: E2BConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ProviderError::ConfigError(
                "E2B API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::ConfigError(e.to_string()))?;

        Ok(Self {
            config,
            client,
            access_tokens: RwLock::new(HashMap::new()),
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn envd(&self, sandbox_id: &str, path: &str) -> String {
        match &self.config.envd_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => format!("https://{}{}", self.get_host(sandbox_id, ENVD_PORT), path),
        }
    }

    async fn with_access_token(&self, sandbox_id: &str, request: RequestBuilder) -> RequestBuilder {
        match self.access_token(sandbox_id).await {
            Some(token) => request.header("X-Access-Token", token),
            None => request,
        }
    }

    async fn access_token(&self, sandbox_id: &str) -> Option<String> {
        self.access_tokens
            .read()
            .await
            .get(sandbox_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.token.clone())
    }

    /// Cache the envd token until the sandbox timeout runs out. Expired entries are dropped on insert.
    async fn remember(&self, sandbox: &SandboxResponse) {
        let Some(token) = &sandbox.envd_access_token else {
            return;
        };

        let now = Instant::now();
        let mut tokens = self.access_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, entry| entry.expires_at > now);
        if tokens.len() < before {
            debug!(pruned = before - tokens.len(), "Dropped expired envd tokens");
        }

        tokens.insert(
            sandbox.sandbox_id.clone(),
            AccessToken {
                token: token.clone(),
                expires_at: now + Duration::from_secs(self.config.sandbox_timeout_secs),
            },
        );
    }

    async fn start_process(
        &self,
        sandbox_id: &str,
        command: &str,
    ) -> std::result::Result<CommandOutput, CommandFailure> {
        let body = json!({
            "process": {
                "cmd": "/bin/bash",
                "args": ["-l", "-c", command],
                "envs": {},
            }
        });
        let payload = serde_json::to_vec(&body)
            .map_err(|e| CommandFailure::from(ProviderError::ProtocolError(e.to_string())))?;

        let request = self
            .client
            .post(self.envd(sandbox_id, "/process.Process/Start"))
            .header("Content-Type", "application/connect+json")
            .header("Connect-Protocol-Version", "1")
            .timeout(COMMAND_TIMEOUT)
            .body(envelope::encode(&payload));
        let response = self
            .with_access_token(sandbox_id, request)
            .await
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut end: Option<EndEvent> = None;
        let mut decoder = Decoder::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return Err(CommandFailure::new(e.to_string(), stdout, stderr)),
            };
            decoder.push(&chunk);

            loop {
                let frame = match decoder.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => return Err(CommandFailure::new(e.to_string(), stdout, stderr)),
                };

                if frame.is_end_stream() {
                    let trailer: EndStreamMessage =
                        serde_json::from_slice(&frame.payload).unwrap_or(EndStreamMessage { error: None });
                    if let Some(err) = trailer.error {
                        let message = format!("{}: {}", err.code, err.message);
                        return Err(CommandFailure::new(message, stdout, stderr));
                    }
                    continue;
                }

                let message: StartResponse = match serde_json::from_slice(&frame.payload) {
                    Ok(message) => message,
                    Err(e) => {
                        let error = format!("invalid process event: {}", e);
                        return Err(CommandFailure::new(error, stdout, stderr));
                    }
                };
                let Some(event) = message.event else {
                    continue;
                };

                if let Some(data) = event.data {
                    if let Some(chunk) = data.stdout {
                        stdout.push_str(&decode_output(&chunk));
                    }
                    if let Some(chunk) = data.stderr {
                        stderr.push_str(&decode_output(&chunk));
                    }
                }
                if event.end.is_some() {
                    end = event.end;
                }
            }
        }

        match end {
            Some(end) if end.exit_code == 0 && end.error.is_none() => Ok(CommandOutput {
                stdout,
                stderr,
                exit_code: 0,
            }),
            Some(end) => {
                let error = end
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("exit status {}", end.exit_code));
                Err(CommandFailure::new(error, stdout, stderr))
            }
            None => Err(CommandFailure::new(
                "process stream ended without an exit event",
                stdout,
                stderr,
            )),
        }
    }
}

fn decode_output(chunk: &str) -> String {
    match STANDARD.decode(chunk) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("Undecodable process output chunk: {}", e);
            String::new()
        }
    }
}

#[async_trait]
impl SandboxProvider for E2BProvider {
    fn name(&self) -> &'static str {
        "e2b"
    }

    async fn create(&self, template: &str) -> Result<String> {
        let response = self
            .client
            .post(self.api("/sandboxes"))
            .header("X-API-Key", &self.config.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&CreateSandboxRequest {
                template_id: template,
                timeout: self.config.sandbox_timeout_secs,
            })
            .send()
            .await
            .map_err(|e| ProviderError::ProvisionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ProvisionFailed(format!(
                "{} {}",
                status.as_u16(),
                body
            )));
        }

        let sandbox: SandboxResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ProvisionFailed(format!("invalid response: {}", e)))?;
        self.remember(&sandbox).await;

        info!(sandbox_id = %sandbox.sandbox_id, template = %template, "E2B sandbox created");
        Ok(sandbox.sandbox_id)
    }

    async fn connect(&self, sandbox_id: &str) -> Result<()> {
        let response = self
            .client
            .get(self.api(&format!("/sandboxes/{}", sandbox_id)))
            .header("X-API-Key", &self.config.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(sandbox_id.to_string())),
            status if status.is_success() => {
                if let Ok(sandbox) = response.json::<SandboxResponse>().await {
                    self.remember(&sandbox).await;
                }
                debug!(sandbox_id = %sandbox_id, "Connected to E2B sandbox");
                Ok(())
            }
            status => Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
    ) -> std::result::Result<CommandOutput, CommandFailure> {
        debug!(sandbox_id = %sandbox_id, command = %command, "Running command");
        self.start_process(sandbox_id, command).await
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<()> {
        let part = Part::bytes(content.as_bytes().to_vec()).file_name(path.to_string());
        let form = Form::new().part("file", part);

        let request = self
            .client
            .post(self.envd(sandbox_id, "/files"))
            .query(&[("path", path), ("username", ENVD_USER)])
            .timeout(REQUEST_TIMEOUT)
            .multipart(form);
        let response = self.with_access_token(sandbox_id, request).await.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::FileError(format!(
                "failed to write {} ({}): {}",
                path,
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String> {
        let request = self
            .client
            .get(self.envd(sandbox_id, "/files"))
            .query(&[("path", path), ("username", ENVD_USER)])
            .timeout(REQUEST_TIMEOUT);
        let response = self.with_access_token(sandbox_id, request).await.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ProviderError::FileError(format!(
                "file not found: {}",
                path
            ))),
            status if status.is_success() => Ok(response.text().await?),
            status => Err(ProviderError::FileError(format!(
                "failed to read {} ({}): {}",
                path,
                status.as_u16(),
                response.text().await.unwrap_or_default()
            ))),
        }
    }

    fn get_host(&self, sandbox_id: &str, port: u16) -> String {
        format!("{}-{}.{}", port, sandbox_id, self.config.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            E2BProvider::new(E2BConfig::new("")),
            Err(ProviderError::ConfigError(_))
        ));
    }

    #[test]
    fn test_host_and_url() {
        let provider = E2BProvider::new(E2BConfig::new("key")).unwrap();
        assert_eq!(provider.get_host("abc123", 3000), "3000-abc123.e2b.app");
        assert_eq!(
            provider.public_url("abc123", 3000),
            "https://3000-abc123.e2b.app"
        );
    }

    #[test]
    fn test_envd_url_defaults_to_sandbox_host() {
        let provider = E2BProvider::new(E2BConfig::new("key")).unwrap();
        assert_eq!(
            provider.envd("abc123", "/files"),
            "https://49983-abc123.e2b.app/files"
        );
    }

    fn sandbox(id: &str, token: &str) -> SandboxResponse {
        SandboxResponse {
            sandbox_id: id.to_string(),
            envd_access_token: Some(token.to_string()),
        }
    }

    #[tokio::test]
    async fn test_access_token_cached_while_sandbox_alive() {
        let provider = E2BProvider::new(E2BConfig::new("key")).unwrap();
        provider.remember(&sandbox("sbx_1", "tok_1")).await;
        provider.remember(&sandbox("sbx_2", "tok_2")).await;

        assert_eq!(provider.access_token("sbx_1").await.as_deref(), Some("tok_1"));
        assert_eq!(provider.access_token("sbx_2").await.as_deref(), Some("tok_2"));
        assert_eq!(provider.access_tokens.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_access_tokens_are_pruned() {
        let mut config = E2BConfig::new("key");
        config.sandbox_timeout_secs = 0;
        let provider = E2BProvider::new(config).unwrap();

        for n in 0..5 {
            provider
                .remember(&sandbox(&format!("sbx_{}", n), "tok"))
                .await;
        }

        assert_eq!(provider.access_token("sbx_4").await, None);
        assert_eq!(provider.access_tokens.read().await.len(), 1);
    }

    #[test]
    fn test_decode_output() {
        assert_eq!(decode_output(&STANDARD.encode("hello\n")), "hello\n");
        assert_eq!(decode_output("%%%"), "");
    }
}
