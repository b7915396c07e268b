// ABOUTME: The coding agent run workflow from sandbox creation to the persisted result
// ABOUTME: Every side effect runs as a memoized step so retries resume where they left off

use std::sync::Arc;

use codingcat_ai::ModelClient;
use codingcat_core::{
    RunOutcome, RunRequest, SandboxHandle, DEFAULT_MAX_ITERATIONS, DEFAULT_SANDBOX_TEMPLATE,
};
use codingcat_sandbox::SandboxProvider;
use codingcat_storage::{Message, PersistenceGateway, StepStore};
use tracing::{info, info_span, Instrument};

use crate::controller::AgentLoop;
use crate::error::{Result, WorkflowError};
use crate::finalizer::finalize;
use crate::state::{AgentState, StopReason};
use crate::steps::{StepRunner, STEP_GET_SANDBOX_ID, STEP_SAVE_RESULT};

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub template: String,
    pub max_iterations: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_SANDBOX_TEMPLATE.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub sandbox: SandboxHandle,
    pub outcome: RunOutcome,
    pub message: Message,
    pub stop_reason: StopReason,
    pub iterations: usize,
    pub replayed_steps: usize,
}

pub struct CodingWorkflow {
    provider: Arc<dyn SandboxProvider>,
    gateway: Arc<dyn PersistenceGateway>,
    steps: Arc<dyn StepStore>,
    agent: AgentLoop,
    template: String,
}

impl CodingWorkflow {
    pub fn new(
        provider: Arc<dyn SandboxProvider>,
        model: Arc<dyn ModelClient>,
        gateway: Arc<dyn PersistenceGateway>,
        steps: Arc<dyn StepStore>,
        config: WorkflowConfig,
    ) -> Self {
        let agent = AgentLoop::new(model, provider.clone()).with_max_iterations(config.max_iterations);
        Self {
            provider,
            gateway,
            steps,
            agent,
            template: config.template,
        }
    }

    pub fn gateway(&self) -> Arc<dyn PersistenceGateway> {
        self.gateway.clone()
    }

    /// Execute one attempt of the run identified by `request.event_id`
    pub async fn execute(&self, request: &RunRequest) -> Result<RunReport> {
        let span = info_span!(
            "run",
            run_id = %request.event_id,
            project_id = %request.project_id
        );
        self.execute_steps(request).instrument(span).await
    }

    async fn execute_steps(&self, request: &RunRequest) -> Result<RunReport> {
        let mut steps = StepRunner::new(request.event_id.clone(), self.steps.clone());
        let provider = self.provider.as_ref();

        let sandbox: SandboxHandle = steps
            .run(STEP_GET_SANDBOX_ID, || async {
                provider
                    .create(&self.template)
                    .await
                    .map(SandboxHandle::new)
                    .map_err(WorkflowError::Provision)
            })
            .await?;
        info!(sandbox_id = %sandbox.sandbox_id, provider = provider.name(), "Sandbox ready");

        let result = self
            .agent
            .run(&mut steps, &sandbox.sandbox_id, &request.task_text, AgentState::new())
            .await?;

        let outcome = finalize(provider, &mut steps, &sandbox.sandbox_id, result.state).await?;

        let gateway = self.gateway.as_ref();
        let message: Message = steps
            .run(STEP_SAVE_RESULT, || async {
                Ok(gateway.persist(&request.project_id, &outcome).await?)
            })
            .await?;

        info!(
            status = ?outcome.status,
            message_id = %message.id,
            replayed_steps = steps.replayed(),
            executed_steps = steps.executed(),
            "Run finished"
        );

        Ok(RunReport {
            sandbox,
            outcome,
            message,
            stop_reason: result.stop_reason,
            iterations: result.iterations,
            replayed_steps: steps.replayed(),
        })
    }
}
