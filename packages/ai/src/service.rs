// ABOUTME: AI service for tool-using conversations with Anthropic Claude
// ABOUTME: Implements the ModelClient capability over the Messages API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::types::{
    ContentBlock, ConversationMessage, ModelRequest, ModelResponse, ToolDefinition, Usage,
};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Calculate appropriate max_tokens for a given model
fn get_max_tokens_for_model(model: &str) -> u32 {
    if model.contains("claude-3-haiku") || model.contains("claude-3-opus") {
        4096
    } else if model.contains("claude-3-5") {
        8192
    } else {
        DEFAULT_MAX_TOKENS
    }
}

#[derive(Debug, Error)]
pub enum AIServiceError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("No API key configured")]
    NoApiKey,

    #[error("Invalid response format")]
    InvalidResponse,
}

pub type AIServiceResult<T> = Result<T, AIServiceError>;

/// Capability to run one model turn
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> AIServiceResult<ModelResponse>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [ConversationMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[allow(dead_code)]
    id: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

/// Anthropic Messages API client
pub struct AIService {
    client: Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl AIService {
    /// Create HTTP client with timeout configuration
    fn create_client() -> AIServiceResult<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()?)
    }

    pub fn new(api_key: Option<String>, model: Option<String>) -> AIServiceResult<Self> {
        if api_key.is_none() {
            info!("ANTHROPIC_API_KEY not set - model calls will fail until a key is configured");
        }

        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model != DEFAULT_MODEL {
            info!("Using custom Anthropic model: {}", model);
        }

        Ok(Self {
            client: Self::create_client()?,
            api_key,
            model,
            api_url: DEFAULT_API_URL.to_string(),
        })
    }

    /// Point the client at a different Messages endpoint
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Get the model being used by this service
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelClient for AIService {
    async fn complete(&self, request: &ModelRequest) -> AIServiceResult<ModelResponse> {
        let api_key = self.api_key.as_ref().ok_or(AIServiceError::NoApiKey)?;

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request
                .max_tokens
                .unwrap_or_else(|| get_max_tokens_for_model(&self.model)),
            temperature: request.temperature,
            system: &request.system,
            messages: &request.messages,
            tools: &request.tools,
        };

        debug!(
            "Making Anthropic API request: model={}, messages={}, tools={}",
            body.model,
            body.messages.len(),
            body.tools.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Anthropic API request timed out after {} seconds", REQUEST_TIMEOUT_SECS);
                    AIServiceError::ApiError(format!(
                        "Request timed out after {} seconds",
                        REQUEST_TIMEOUT_SECS
                    ))
                } else if e.is_connect() {
                    error!("Failed to connect to Anthropic API: {}", e);
                    AIServiceError::ApiError(format!("Connection failed: {}", e))
                } else {
                    error!("Anthropic API request failed: {}", e);
                    AIServiceError::RequestFailed(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Anthropic API error: {} - {}", status, error_text);
            return Err(AIServiceError::ApiError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AIServiceError::ParseError(e.to_string()))?;

        if parsed.content.is_empty() && parsed.stop_reason.as_deref() != Some("end_turn") {
            return Err(AIServiceError::InvalidResponse);
        }

        info!(
            "Anthropic turn complete: stop_reason={}, input_tokens={}, output_tokens={}",
            parsed.stop_reason.as_deref().unwrap_or("none"),
            parsed.usage.input_tokens,
            parsed.usage.output_tokens
        );

        Ok(ModelResponse {
            content: parsed.content,
            stop_reason: parsed.stop_reason,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_tokens_for_model() {
        assert_eq!(get_max_tokens_for_model("claude-3-haiku-20240307"), 4096);
        assert_eq!(get_max_tokens_for_model("claude-3-5-sonnet-latest"), 8192);
        assert_eq!(get_max_tokens_for_model(DEFAULT_MODEL), DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_default_model() {
        let service = AIService::new(Some("key".to_string()), None).unwrap();
        assert_eq!(service.model(), DEFAULT_MODEL);
    }
}
