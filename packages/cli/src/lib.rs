// ABOUTME: CodingCat command-line entry points and service wiring
// ABOUTME: Hosts configuration, the API server, and the one-shot run command

pub mod commands;
pub mod config;
pub mod error;
pub mod runtime;
pub mod server;

pub use config::{Config, ConfigError};
pub use error::{CliError, Result};
pub use runtime::Services;
pub use server::run_server;

use codingcat_config::constants::RUST_LOG;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,codingcat=debug";

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(RUST_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(false)
        .init();
}
