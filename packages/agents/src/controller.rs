// ABOUTME: Agent loop controller driving model turns and their tool calls
// ABOUTME: Stops when the completion marker appears or the turn cap is reached

use std::sync::Arc;

use codingcat_ai::{
    ContentBlock, ConversationMessage, ModelClient, ModelRequest, ModelResponse, ToolCall,
};
use codingcat_core::DEFAULT_MAX_ITERATIONS;
use codingcat_sandbox::SandboxProvider;
use tracing::{debug, info};

use crate::error::Result;
use crate::prompts::{system_prompt, CONTINUE_PROMPT};
use crate::state::{choose_next_action, AgentState, NextAction, StopReason};
use crate::steps::{StepRunner, STEP_CODE_AGENT};
use crate::tools::{self, ToolInvocation, WriteFilesResult};

pub const AGENT_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct LoopResult {
    pub state: AgentState,
    pub stop_reason: StopReason,
    pub iterations: usize,
}

pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    provider: Arc<dyn SandboxProvider>,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ModelClient>, provider: Arc<dyn SandboxProvider>) -> Self {
        Self {
            model,
            provider,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub async fn run(
        &self,
        steps: &mut StepRunner,
        sandbox_id: &str,
        task: &str,
        mut state: AgentState,
    ) -> Result<LoopResult> {
        let mut conversation = vec![ConversationMessage::user_text(task)];
        let mut iteration = 0;

        let stop_reason = loop {
            match choose_next_action(&state, iteration, self.max_iterations) {
                NextAction::Stop(reason) => break reason,
                NextAction::InvokeAgent => {}
            }

            let request = ModelRequest {
                system: system_prompt(&state.files),
                messages: conversation.clone(),
                tools: tools::tool_definitions(),
                temperature: AGENT_TEMPERATURE,
                max_tokens: None,
            };

            let key = steps.next_key(STEP_CODE_AGENT);
            let response: ModelResponse = steps
                .run(&key, || async { Ok(self.model.complete(&request).await?) })
                .await?;
            iteration += 1;

            let calls = response.tool_calls();
            debug!(
                run_id = %steps.run_id(),
                iteration,
                tool_calls = calls.len(),
                "Model turn complete"
            );

            if response.content.is_empty() {
                continue;
            }
            conversation.push(ConversationMessage::assistant(response.content.clone()));

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let (block, next_state) = self.execute_tool(steps, sandbox_id, call, state).await?;
                state = next_state;
                results.push(block);
            }

            if let Some(text) = response.text() {
                state = state.observe_assistant_text(&text);
            }

            if !results.is_empty() {
                conversation.push(ConversationMessage::user(results));
            } else if state.summary.is_none() {
                conversation.push(ConversationMessage::user_text(CONTINUE_PROMPT));
            }
        };

        info!(
            run_id = %steps.run_id(),
            iterations = iteration,
            files = state.files.len(),
            stop_reason = ?stop_reason,
            "Agent loop finished"
        );

        Ok(LoopResult {
            state,
            stop_reason,
            iterations: iteration,
        })
    }

    /// Execute one tool call and return the result block and the updated state
    async fn execute_tool(
        &self,
        steps: &mut StepRunner,
        sandbox_id: &str,
        call: &ToolCall,
        state: AgentState,
    ) -> Result<(ContentBlock, AgentState)> {
        let invocation = match ToolInvocation::parse(&call.name, &call.input) {
            Ok(invocation) => invocation,
            Err(message) => {
                let block = ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: message,
                    is_error: true,
                };
                return Ok((block, state));
            }
        };

        let key = steps.next_key(invocation.step_name());
        let provider = self.provider.as_ref();

        let (content, state) = match invocation {
            ToolInvocation::Terminal { command } => {
                let output: String = steps
                    .run(&key, || async { Ok(tools::terminal(provider, sandbox_id, &command).await) })
                    .await?;
                (output, state)
            }
            ToolInvocation::CreateOrUpdateFiles { files } => {
                let current = &state.files;
                let result: WriteFilesResult = steps
                    .run(&key, || async {
                        Ok(tools::write_files(provider, sandbox_id, &files, current).await)
                    })
                    .await?;
                let content = tools::describe_write(&files, &result);
                let state = match result {
                    WriteFilesResult::Written(updated) => state.merge_files(updated),
                    WriteFilesResult::Failed(_) => state,
                };
                (content, state)
            }
            ToolInvocation::ReadFiles { files } => {
                let output: String = steps
                    .run(&key, || async { Ok(tools::read_files(provider, sandbox_id, &files).await) })
                    .await?;
                (output, state)
            }
        };

        Ok((ContentBlock::tool_result(call.id.clone(), content), state))
    }
}
