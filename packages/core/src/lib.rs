// ABOUTME: Core types, constants, and utilities for CodingCat
// ABOUTME: Foundational package shared by the sandbox, agent workflow, storage, and API crates

pub mod constants;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export main types
pub use types::{FileMap, OutcomeStatus, RunOutcome, RunRequest, SandboxHandle};

// Re-export constants
pub use constants::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_SANDBOX_TEMPLATE, ERROR_ADVISORY_MESSAGE, FRAGMENT_TITLE,
    MAX_PROMPT_LENGTH, SANDBOX_PORT,
};

// Re-export utilities
pub use utils::{generate_event_id, generate_project_name, truncate};

// Re-export validation
pub use validation::{validate_prompt, ValidationError};
