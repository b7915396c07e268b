// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across CodingCat

// Server Configuration
pub const CODINGCAT_API_HOST: &str = "CODINGCAT_API_HOST";
pub const CODINGCAT_API_PORT: &str = "CODINGCAT_API_PORT";
pub const PORT: &str = "PORT"; // Legacy
pub const CODINGCAT_CORS_ORIGIN: &str = "CODINGCAT_CORS_ORIGIN";

// Database
pub const CODINGCAT_DATABASE_URL: &str = "CODINGCAT_DATABASE_URL";
pub const DATABASE_URL: &str = "DATABASE_URL"; // Legacy

// Sandbox Configuration
pub const CODINGCAT_SANDBOX_PROVIDER: &str = "CODINGCAT_SANDBOX_PROVIDER";
pub const CODINGCAT_SANDBOX_TEMPLATE: &str = "CODINGCAT_SANDBOX_TEMPLATE";
pub const CODINGCAT_LOCAL_SANDBOX_ROOT: &str = "CODINGCAT_LOCAL_SANDBOX_ROOT";
pub const E2B_API_KEY: &str = "E2B_API_KEY";
pub const E2B_API_URL: &str = "E2B_API_URL";
pub const E2B_DOMAIN: &str = "E2B_DOMAIN";
pub const E2B_SANDBOX_TIMEOUT_SECS: &str = "E2B_SANDBOX_TIMEOUT_SECS";

// Model Configuration
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_MODEL: &str = "ANTHROPIC_MODEL";
pub const ANTHROPIC_API_URL: &str = "ANTHROPIC_API_URL";

// Run Workflow
pub const CODINGCAT_MAX_ITERATIONS: &str = "CODINGCAT_MAX_ITERATIONS";
pub const CODINGCAT_MAX_ATTEMPTS: &str = "CODINGCAT_MAX_ATTEMPTS";
pub const CODINGCAT_RETRY_BASE_DELAY_MS: &str = "CODINGCAT_RETRY_BASE_DELAY_MS";
pub const CODINGCAT_MAX_CONCURRENT_RUNS: &str = "CODINGCAT_MAX_CONCURRENT_RUNS";
pub const CODINGCAT_QUEUE_CAPACITY: &str = "CODINGCAT_QUEUE_CAPACITY";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";
