// ABOUTME: Run result finalizer deciding success and resolving the sandbox preview URL
// ABOUTME: Success needs both a summary and at least one written file

use codingcat_core::{OutcomeStatus, RunOutcome, SANDBOX_PORT};
use codingcat_sandbox::SandboxProvider;

use crate::error::{Result, WorkflowError};
use crate::state::AgentState;
use crate::steps::{StepRunner, STEP_GET_SANDBOX_URL};

/// Reconnect to the sandbox, resolve its public URL, and classify the end state
pub async fn finalize(
    provider: &dyn SandboxProvider,
    steps: &mut StepRunner,
    sandbox_id: &str,
    state: AgentState,
) -> Result<RunOutcome> {
    let sandbox_url: String = steps
        .run(STEP_GET_SANDBOX_URL, || async {
            provider
                .connect(sandbox_id)
                .await
                .map_err(WorkflowError::Sandbox)?;
            Ok(provider.public_url(sandbox_id, SANDBOX_PORT))
        })
        .await?;

    Ok(build_outcome(state, sandbox_url))
}

pub fn build_outcome(state: AgentState, sandbox_url: String) -> RunOutcome {
    let has_summary = state
        .summary
        .as_deref()
        .is_some_and(|summary| !summary.trim().is_empty());
    let is_error = !has_summary || state.files.is_empty();

    RunOutcome {
        status: if is_error {
            OutcomeStatus::Error
        } else {
            OutcomeStatus::Success
        },
        summary_text: state.summary,
        file_snapshot: state.files,
        sandbox_url,
    }
}
