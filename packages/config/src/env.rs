// ABOUTME: Typed environment variable lookups with defaults
// ABOUTME: Invalid values fall back to the default and are reported through tracing

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Read a variable, treating unset and empty values as absent
pub fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a variable or fall back to `default`
pub fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

/// Parse a variable, falling back to `default` when unset or unparsable
pub fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Invalid value '{}' for {}, using default {}",
                    raw, name, default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name so parallel tests don't interfere

    #[test]
    fn test_env_or_default() {
        env::remove_var("CODINGCAT_TEST_ENV_OR");
        assert_eq!(env_or("CODINGCAT_TEST_ENV_OR", "fallback"), "fallback");
    }

    #[test]
    fn test_env_opt_ignores_empty() {
        env::set_var("CODINGCAT_TEST_ENV_EMPTY", "  ");
        assert_eq!(env_opt("CODINGCAT_TEST_ENV_EMPTY"), None);
        env::remove_var("CODINGCAT_TEST_ENV_EMPTY");
    }

    #[test]
    fn test_env_parse_valid_and_invalid() {
        env::set_var("CODINGCAT_TEST_ENV_PARSE", "42");
        assert_eq!(env_parse::<u32>("CODINGCAT_TEST_ENV_PARSE", 7), 42);

        env::set_var("CODINGCAT_TEST_ENV_PARSE", "not-a-number");
        assert_eq!(env_parse::<u32>("CODINGCAT_TEST_ENV_PARSE", 7), 7);
        env::remove_var("CODINGCAT_TEST_ENV_PARSE");
    }
}
