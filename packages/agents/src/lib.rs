// ABOUTME: Coding agent run workflow: sandbox provisioning, agent loop, finalizer, and dispatch
// ABOUTME: Drives a tool-using model against a sandbox and persists the outcome once per run

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod finalizer;
pub mod prompts;
pub mod state;
pub mod steps;
pub mod tools;
pub mod workflow;

pub use controller::{AgentLoop, LoopResult, AGENT_TEMPERATURE};
pub use dispatcher::{DispatcherConfig, RetryPolicy, RunDispatcher, RunExecutor};
pub use error::{Result, WorkflowError};
pub use finalizer::{build_outcome, finalize};
pub use state::{choose_next_action, AgentState, NextAction, StopReason, SUMMARY_MARKER};
pub use steps::StepRunner;
pub use tools::{FileInput, ToolInvocation, WriteFilesResult};
pub use workflow::{CodingWorkflow, RunReport, WorkflowConfig};
