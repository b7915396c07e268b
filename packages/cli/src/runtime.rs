// ABOUTME: Builds the database, sandbox provider, model client, and run executor from config
// ABOUTME: Shared by the API server and the one-shot run command

use std::sync::Arc;

use codingcat_agents::{CodingWorkflow, RunDispatcher, RunExecutor};
use codingcat_ai::{AIService, ModelClient};
use codingcat_sandbox::{E2BProvider, LocalProvider, ProviderKind, SandboxProvider};
use codingcat_storage::{DbState, SqlitePersistenceGateway, StepStore};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{Config, ConfigError, ModelSettings, SandboxSettings};
use crate::error::Result;

pub fn build_provider(settings: &SandboxSettings) -> Result<Arc<dyn SandboxProvider>> {
    let provider: Arc<dyn SandboxProvider> = match settings.provider {
        ProviderKind::E2B => {
            let config = settings.e2b.clone().ok_or(ConfigError::MissingVar(
                codingcat_config::constants::E2B_API_KEY,
                ProviderKind::E2B,
            ))?;
            Arc::new(E2BProvider::new(config)?)
        }
        ProviderKind::Local => Arc::new(LocalProvider::new(settings.local_root.clone())),
    };
    info!(provider = provider.name(), template = %settings.template, "Sandbox provider configured");
    Ok(provider)
}

pub fn build_model(settings: &ModelSettings) -> Result<Arc<dyn ModelClient>> {
    let mut service = AIService::new(settings.api_key.clone(), settings.model.clone())?;
    if let Some(url) = &settings.api_url {
        service = service.with_api_url(url.clone());
    }
    info!(model = service.model(), "Model client configured");
    Ok(Arc::new(service))
}

/// Everything needed to execute runs against one database
pub struct Services {
    pub db: DbState,
    pub executor: Arc<RunExecutor>,
}

impl Services {
    pub async fn init(config: &Config) -> Result<Self> {
        let db = DbState::open(&config.database_url).await?;
        info!(database_url = %config.database_url, "Database ready");

        let provider = build_provider(&config.sandbox)?;
        let model = build_model(&config.model)?;
        Ok(Self::with_parts(db, provider, model, config))
    }

    pub fn with_parts(
        db: DbState,
        provider: Arc<dyn SandboxProvider>,
        model: Arc<dyn ModelClient>,
        config: &Config,
    ) -> Self {
        let gateway = Arc::new(SqlitePersistenceGateway::new(
            db.messages.clone(),
            db.projects.clone(),
        ));
        let steps: Arc<dyn StepStore> = db.steps.clone();
        let workflow = Arc::new(CodingWorkflow::new(
            provider,
            model,
            gateway,
            steps,
            config.workflow(),
        ));
        let executor = Arc::new(RunExecutor::new(
            workflow,
            db.runs.clone(),
            config.retry_policy(),
        ));
        Self { db, executor }
    }

    pub fn start_dispatcher(&self, config: &Config) -> (RunDispatcher, JoinHandle<()>) {
        RunDispatcher::start(self.executor.clone(), config.dispatcher())
    }
}
