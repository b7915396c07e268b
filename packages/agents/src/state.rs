// ABOUTME: Agent state threaded through the loop and the pure routing decision
// ABOUTME: The loop continues until a summary appears or the iteration cap is reached

use codingcat_core::FileMap;
use serde::{Deserialize, Serialize};

/// Reserved substring the model emits when it considers the task finished
pub const SUMMARY_MARKER: &str = "<task_summary>";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub files: FileMap,
    pub summary: Option<String>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge written files, overwriting by path and keeping everything else
    pub fn merge_files(mut self, written: FileMap) -> Self {
        self.files.extend(written);
        self
    }

    /// Record the summary if `text` carries the marker. A summary is set at most once.
    pub fn observe_assistant_text(mut self, text: &str) -> Self {
        if self.summary.is_none() && text.contains(SUMMARY_MARKER) {
            self.summary = Some(text.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Summarized,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    InvokeAgent,
    Stop(StopReason),
}

/// Decide what happens at the start of a cycle. `iteration` counts completed model turns.
pub fn choose_next_action(state: &AgentState, iteration: usize, max_iterations: usize) -> NextAction {
    if state.summary.is_some() {
        NextAction::Stop(StopReason::Summarized)
    } else if iteration >= max_iterations {
        NextAction::Stop(StopReason::Exhausted)
    } else {
        NextAction::InvokeAgent
    }
}
