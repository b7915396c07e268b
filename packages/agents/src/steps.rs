// ABOUTME: Durable step runner memoizing each workflow step by run id and step key
// ABOUTME: Completed steps replay their saved output when a run is retried

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use codingcat_storage::StepStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, WorkflowError};

pub const STEP_GET_SANDBOX_ID: &str = "get-sandbox-id";
pub const STEP_GET_SANDBOX_URL: &str = "get-sandbox-url";
pub const STEP_SAVE_RESULT: &str = "save-result";
pub const STEP_CODE_AGENT: &str = "code-agent";

pub struct StepRunner {
    run_id: String,
    store: Arc<dyn StepStore>,
    counters: HashMap<String, usize>,
    replayed: usize,
    executed: usize,
}

impl StepRunner {
    pub fn new(run_id: impl Into<String>, store: Arc<dyn StepStore>) -> Self {
        Self {
            run_id: run_id.into(),
            store,
            counters: HashMap::new(),
            replayed: 0,
            executed: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Key for the next occurrence of a repeated step, e.g. `terminal#3`
    pub fn next_key(&mut self, name: &str) -> String {
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        format!("{}#{}", name, counter)
    }

    /// Return the saved output of `key`, or run `f` and save what it returns.
    /// Errors from `f` are not saved, so the step runs again on retry.
    pub async fn run<T, F, Fut>(&mut self, key: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(saved) = self.store.load(&self.run_id, key).await? {
            let value = serde_json::from_value(saved).map_err(|source| {
                WorkflowError::StepDecode {
                    key: key.to_string(),
                    source,
                }
            })?;
            debug!(run_id = %self.run_id, step = %key, "Step replayed");
            self.replayed += 1;
            return Ok(value);
        }

        let value = f().await?;
        let encoded = serde_json::to_value(&value).map_err(|source| WorkflowError::StepEncode {
            key: key.to_string(),
            source,
        })?;
        self.store.save(&self.run_id, key, &encoded).await?;

        debug!(run_id = %self.run_id, step = %key, "Step completed");
        self.executed += 1;
        Ok(value)
    }

    /// Steps served from the store in this attempt
    pub fn replayed(&self) -> usize {
        self.replayed
    }

    /// Steps executed and saved in this attempt
    pub fn executed(&self) -> usize {
        self.executed
    }
}
