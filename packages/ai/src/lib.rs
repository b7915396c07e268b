// ABOUTME: AI service integration for agent runs
// ABOUTME: Anthropic tool-use client behind the ModelClient trait

pub mod service;
pub mod types;

// Re-export service types
pub use service::{AIService, AIServiceError, AIServiceResult, ModelClient, DEFAULT_MODEL};

// Re-export conversation types
pub use types::{
    ContentBlock, ConversationMessage, ModelRequest, ModelResponse, Role, ToolCall,
    ToolDefinition, Usage,
};
