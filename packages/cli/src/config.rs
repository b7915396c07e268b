// ABOUTME: Typed runtime configuration read from the environment
// ABOUTME: Covers the API server, database, sandbox backend, model, and run dispatch

use std::path::PathBuf;
use std::time::Duration;

use codingcat_agents::{DispatcherConfig, RetryPolicy, WorkflowConfig};
use codingcat_config::constants::*;
use codingcat_config::{env_opt, env_or, env_parse};
use codingcat_core::{DEFAULT_MAX_ITERATIONS, DEFAULT_SANDBOX_TEMPLATE};
use codingcat_sandbox::{E2BConfig, ProviderKind};
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://codingcat.db";
const DEFAULT_API_HOST: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 4001;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid sandbox provider: {0}")]
    InvalidProvider(String),
    #[error("{0} must be set when using the {1} sandbox provider")]
    MissingVar(&'static str, ProviderKind),
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

#[derive(Debug, Clone)]
pub struct SandboxSettings {
    pub provider: ProviderKind,
    pub template: String,
    pub e2b: Option<E2BConfig>,
    pub local_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub database_url: String,
    pub sandbox: SandboxSettings,
    pub model: ModelSettings,
    pub max_iterations: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub max_concurrent_runs: usize,
    pub queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_opt(CODINGCAT_API_PORT)
            .or_else(|| env_opt(PORT))
            .map(|raw| raw.trim().parse::<u16>().unwrap_or(0))
            .unwrap_or(DEFAULT_API_PORT);
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let database_url = env_opt(CODINGCAT_DATABASE_URL)
            .or_else(|| env_opt(DATABASE_URL))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_iterations = positive(CODINGCAT_MAX_ITERATIONS, DEFAULT_MAX_ITERATIONS)?;
        let max_attempts = positive(CODINGCAT_MAX_ATTEMPTS, RetryPolicy::default().max_attempts)?;
        let max_concurrent_runs = positive(
            CODINGCAT_MAX_CONCURRENT_RUNS,
            DispatcherConfig::default().max_concurrent_runs,
        )?;
        let queue_capacity = positive(
            CODINGCAT_QUEUE_CAPACITY,
            DispatcherConfig::default().queue_capacity,
        )?;
        let default_delay_ms = RetryPolicy::default().base_delay.as_millis() as u64;
        let retry_base_delay =
            Duration::from_millis(env_parse(CODINGCAT_RETRY_BASE_DELAY_MS, default_delay_ms));

        Ok(Config {
            host: env_or(CODINGCAT_API_HOST, DEFAULT_API_HOST),
            port,
            cors_origin: env_or(CODINGCAT_CORS_ORIGIN, DEFAULT_CORS_ORIGIN),
            database_url,
            sandbox: sandbox_from_env()?,
            model: ModelSettings {
                api_key: env_opt(ANTHROPIC_API_KEY),
                model: env_opt(ANTHROPIC_MODEL),
                api_url: env_opt(ANTHROPIC_API_URL),
            },
            max_iterations,
            max_attempts,
            retry_base_delay,
            max_concurrent_runs,
            queue_capacity,
        })
    }

    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            template: self.sandbox.template.clone(),
            max_iterations: self.max_iterations,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.retry_base_delay,
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent_runs: self.max_concurrent_runs,
            queue_capacity: self.queue_capacity,
        }
    }
}

fn sandbox_from_env() -> Result<SandboxSettings, ConfigError> {
    let provider = env_or(CODINGCAT_SANDBOX_PROVIDER, "e2b")
        .parse::<ProviderKind>()
        .map_err(|e| ConfigError::InvalidProvider(e.to_string()))?;

    let e2b = match (provider, env_opt(E2B_API_KEY)) {
        (ProviderKind::E2B, None) => {
            return Err(ConfigError::MissingVar(E2B_API_KEY, provider));
        }
        (_, Some(key)) => {
            let mut e2b = E2BConfig::new(key);
            if let Some(url) = env_opt(E2B_API_URL) {
                e2b.api_url = url;
            }
            if let Some(domain) = env_opt(E2B_DOMAIN) {
                e2b.domain = domain;
            }
            e2b.sandbox_timeout_secs = env_parse(E2B_SANDBOX_TIMEOUT_SECS, e2b.sandbox_timeout_secs);
            Some(e2b)
        }
        (_, None) => None,
    };

    let local_root = env_opt(CODINGCAT_LOCAL_SANDBOX_ROOT)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("codingcat-sandboxes"));

    Ok(SandboxSettings {
        provider,
        template: env_or(CODINGCAT_SANDBOX_TEMPLATE, DEFAULT_SANDBOX_TEMPLATE),
        e2b,
        local_root,
    })
}

fn positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + std::fmt::Display + PartialOrd + Default,
{
    let value = env_parse(name, default);
    if value <= T::default() {
        return Err(ConfigError::ZeroValue(name));
    }
    Ok(value)
}
