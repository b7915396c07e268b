// ABOUTME: Environment variable names and typed lookup helpers
// ABOUTME: Shared by the CLI and API so every crate reads the same configuration keys

pub mod constants;
pub mod env;

pub use env::{env_opt, env_or, env_parse};
