// ABOUTME: Fixed values shared across the run workflow and the API
// ABOUTME: Port, template, iteration cap, advisory text, and prompt limits

/// Port the generated app listens on inside the sandbox
pub const SANDBOX_PORT: u16 = 3000;

/// Sandbox template used when none is configured
pub const DEFAULT_SANDBOX_TEMPLATE: &str = "vibe-next-testing";

/// Hard ceiling on model turns per run
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Content of the assistant message persisted for any failed run
pub const ERROR_ADVISORY_MESSAGE: &str = "Something went wrong. Please try again.";

/// Display title of fragments created for successful runs
pub const FRAGMENT_TITLE: &str = "Fragment";

/// Maximum accepted length (in characters) of a user prompt
pub const MAX_PROMPT_LENGTH: usize = 10_000;
