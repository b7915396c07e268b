// ABOUTME: Scripted model and in-memory sandbox used by the workflow tests
// ABOUTME: Both record every call so tests can assert on side effects

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codingcat_agents::{CodingWorkflow, WorkflowConfig};
use codingcat_ai::{
    AIServiceError, AIServiceResult, ContentBlock, ModelClient, ModelRequest, ModelResponse, Usage,
};
use codingcat_sandbox::{CommandFailure, CommandOutput, ProviderError, SandboxProvider};
use codingcat_storage::{DbState, SqlitePersistenceGateway, StepStore};
use serde_json::{json, Value};

pub fn text(text: &str) -> ContentBlock {
    ContentBlock::text(text)
}

pub fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

pub fn write_call(id: &str, files: &[(&str, &str)]) -> ContentBlock {
    let files: Vec<Value> = files
        .iter()
        .map(|(path, content)| json!({"path": path, "content": content}))
        .collect();
    tool_use(id, "createOrUpdateFiles", json!({ "files": files }))
}

pub fn turn(content: Vec<ContentBlock>) -> ModelResponse {
    let stop_reason = if content
        .iter()
        .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    {
        "tool_use"
    } else {
        "end_turn"
    };
    ModelResponse {
        content,
        stop_reason: Some(stop_reason.to_string()),
        usage: Usage::default(),
    }
}

/// Model that replays a fixed list of turns, then repeats a fallback turn
pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelResponse>>,
    fallback: ModelResponse,
    failing_calls: Mutex<HashSet<usize>>,
    requests: Mutex<Vec<ModelRequest>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedModel {
    pub fn new(script: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: turn(vec![text("Still working on it.")]),
            failing_calls: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Hold every answer for `delay` so a run stays in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make the n-th call (1-based) fail without consuming a scripted turn
    pub fn fail_on_call(self, call: usize) -> Self {
        self.failing_calls.lock().unwrap().insert(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> AIServiceResult<ModelResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing_calls.lock().unwrap().contains(&call) {
            return Err(AIServiceError::ApiError("API returned 529: overloaded".to_string()));
        }

        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// In-memory sandbox. Commands containing "fail" exit with status 1.
#[derive(Default)]
pub struct FakeSandbox {
    files: Mutex<HashMap<(String, String), String>>,
    sandboxes: Mutex<HashSet<String>>,
    failing_paths: Mutex<HashSet<String>>,
    fail_create: bool,
    created: AtomicUsize,
    create_attempts: AtomicUsize,
    writes: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn fail_writes_to(self, path: &str) -> Self {
        self.failing_paths.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn create_attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn file(&self, sandbox_id: &str, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&(sandbox_id.to_string(), path.to_string()))
            .cloned()
    }

    fn ensure(&self, sandbox_id: &str) -> Result<(), ProviderError> {
        if self.sandboxes.lock().unwrap().contains(sandbox_id) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(sandbox_id.to_string()))
        }
    }
}

#[async_trait]
impl SandboxProvider for FakeSandbox {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create(&self, _template: &str) -> Result<String, ProviderError> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(ProviderError::ProvisionFailed("no capacity".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("sbx{}", n);
        self.sandboxes.lock().unwrap().insert(id.clone());
        Ok(id)
    }

    async fn connect(&self, sandbox_id: &str) -> Result<(), ProviderError> {
        self.ensure(sandbox_id)
    }

    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
    ) -> Result<CommandOutput, CommandFailure> {
        self.ensure(sandbox_id)?;
        self.commands.lock().unwrap().push(command.to_string());

        if command.contains("fail") {
            return Err(CommandFailure::new(
                "exit status 1",
                "partial".to_string(),
                "boom".to_string(),
            ));
        }
        Ok(CommandOutput {
            stdout: format!("ran: {}", command),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<(), ProviderError> {
        self.ensure(sandbox_id)?;
        if self.failing_paths.lock().unwrap().contains(path) {
            return Err(ProviderError::FileError(format!("permission denied: {}", path)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert((sandbox_id.to_string(), path.to_string()), content.to_string());
        Ok(())
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String, ProviderError> {
        self.ensure(sandbox_id)?;
        self.file(sandbox_id, path)
            .ok_or_else(|| ProviderError::FileError(format!("file not found: {}", path)))
    }

    fn get_host(&self, sandbox_id: &str, port: u16) -> String {
        format!("{}-{}.sandbox.test", port, sandbox_id)
    }
}

pub struct Harness {
    pub db: DbState,
    pub project_id: String,
    pub model: Arc<ScriptedModel>,
    pub sandbox: Arc<FakeSandbox>,
    pub workflow: Arc<CodingWorkflow>,
}

pub async fn harness(model: ScriptedModel, sandbox: FakeSandbox) -> Harness {
    let db = DbState::in_memory().await.unwrap();
    let project = db.projects.create_project().await.unwrap();
    let model = Arc::new(model);
    let sandbox = Arc::new(sandbox);

    let gateway = Arc::new(SqlitePersistenceGateway::new(
        db.messages.clone(),
        db.projects.clone(),
    ));
    let steps: Arc<dyn StepStore> = db.steps.clone();

    let workflow = Arc::new(CodingWorkflow::new(
        sandbox.clone(),
        model.clone(),
        gateway,
        steps,
        WorkflowConfig::default(),
    ));

    Harness {
        db,
        project_id: project.id,
        model,
        sandbox,
        workflow,
    }
}

/// Content of the tool result blocks in a request's last message
pub fn last_tool_results(request: &ModelRequest) -> Vec<(String, bool)> {
    request
        .messages
        .last()
        .map(|message| {
            message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolResult {
                        content, is_error, ..
                    } => Some((content.clone(), *is_error)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
