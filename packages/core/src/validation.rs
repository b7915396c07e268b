// ABOUTME: Input validation for user-submitted prompts
// ABOUTME: Rejects empty and over-long values before a run is enqueued

use thiserror::Error;

use crate::constants::MAX_PROMPT_LENGTH;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message is required")]
    Empty,
    #[error("Message is too long (max {max} characters, got {actual})")]
    TooLong { max: usize, actual: usize },
}

/// Validate a prompt and return it unchanged when accepted
pub fn validate_prompt(value: &str) -> Result<&str, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let actual = value.chars().count();
    if actual > MAX_PROMPT_LENGTH {
        return Err(ValidationError::TooLong {
            max: MAX_PROMPT_LENGTH,
            actual,
        });
    }

    Ok(value)
}
