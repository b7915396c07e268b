// ABOUTME: Sandbox providers used by agent runs to execute commands and manage files
// ABOUTME: Exposes the SandboxProvider capability trait with E2B and local backends

pub mod providers;

pub use providers::{
    CommandFailure, CommandOutput, E2BConfig, E2BProvider, LocalProvider, ProviderError,
    ProviderKind, SandboxProvider,
};
