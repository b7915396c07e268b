// ABOUTME: Tests for reading configuration from environment variables
// ABOUTME: Serialized because they mutate the process environment

use std::env;
use std::time::Duration;

use codingcat_cli::{Config, ConfigError};
use codingcat_sandbox::ProviderKind;
use pretty_assertions::assert_eq;
use serial_test::serial;

const VARS: &[&str] = &[
    "CODINGCAT_API_HOST",
    "CODINGCAT_API_PORT",
    "PORT",
    "CODINGCAT_DATABASE_URL",
    "DATABASE_URL",
    "CODINGCAT_SANDBOX_PROVIDER",
    "CODINGCAT_SANDBOX_TEMPLATE",
    "CODINGCAT_LOCAL_SANDBOX_ROOT",
    "E2B_API_KEY",
    "E2B_API_URL",
    "E2B_DOMAIN",
    "E2B_SANDBOX_TIMEOUT_SECS",
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_MODEL",
    "ANTHROPIC_API_URL",
    "CODINGCAT_MAX_ITERATIONS",
    "CODINGCAT_MAX_ATTEMPTS",
    "CODINGCAT_RETRY_BASE_DELAY_MS",
    "CODINGCAT_MAX_CONCURRENT_RUNS",
    "CODINGCAT_QUEUE_CAPACITY",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_with_e2b_key() {
    clear_env();
    env::set_var("E2B_API_KEY", "e2b_test");

    let config = Config::from_env().unwrap();

    assert_eq!(config.port, 4001);
    assert_eq!(config.database_url, "sqlite://codingcat.db");
    assert_eq!(config.sandbox.provider, ProviderKind::E2B);
    assert_eq!(config.sandbox.template, "vibe-next-testing");
    assert_eq!(config.max_iterations, 15);
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.max_concurrent_runs, 4);
    assert_eq!(config.retry_base_delay, Duration::from_secs(2));

    let e2b = config.sandbox.e2b.unwrap();
    assert_eq!(e2b.api_key, "e2b_test");
    assert_eq!(e2b.api_url, "https://api.e2b.app");
    assert_eq!(e2b.domain, "e2b.app");
    assert!(config.model.api_key.is_none());
    clear_env();
}

#[test]
#[serial]
fn test_e2b_requires_api_key() {
    clear_env();
    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::MissingVar("E2B_API_KEY", ProviderKind::E2B)));
}

#[test]
#[serial]
fn test_local_provider_and_overrides() {
    clear_env();
    env::set_var("CODINGCAT_SANDBOX_PROVIDER", "local");
    env::set_var("CODINGCAT_LOCAL_SANDBOX_ROOT", "/tmp/cc-sandboxes");
    env::set_var("CODINGCAT_API_PORT", "8080");
    env::set_var("CODINGCAT_MAX_ITERATIONS", "5");
    env::set_var("CODINGCAT_MAX_ATTEMPTS", "1");
    env::set_var("ANTHROPIC_MODEL", "claude-test");

    let config = Config::from_env().unwrap();

    assert_eq!(config.sandbox.provider, ProviderKind::Local);
    assert!(config.sandbox.e2b.is_none());
    assert_eq!(
        config.sandbox.local_root,
        std::path::PathBuf::from("/tmp/cc-sandboxes")
    );
    assert_eq!(config.port, 8080);
    assert_eq!(config.workflow().max_iterations, 5);
    assert_eq!(config.retry_policy().max_attempts, 1);
    assert_eq!(config.model.model.as_deref(), Some("claude-test"));
    clear_env();
}

#[test]
#[serial]
fn test_rejects_invalid_values() {
    clear_env();
    env::set_var("CODINGCAT_SANDBOX_PROVIDER", "docker");
    assert!(matches!(
        Config::from_env().unwrap_err(),
        ConfigError::InvalidProvider(_)
    ));

    env::set_var("CODINGCAT_SANDBOX_PROVIDER", "local");
    env::set_var("CODINGCAT_API_PORT", "0");
    assert!(matches!(
        Config::from_env().unwrap_err(),
        ConfigError::PortOutOfRange(0)
    ));

    env::remove_var("CODINGCAT_API_PORT");
    env::set_var("CODINGCAT_MAX_CONCURRENT_RUNS", "0");
    assert!(matches!(
        Config::from_env().unwrap_err(),
        ConfigError::ZeroValue("CODINGCAT_MAX_CONCURRENT_RUNS")
    ));
    clear_env();
}
