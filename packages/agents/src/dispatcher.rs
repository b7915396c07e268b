// ABOUTME: Run dispatcher consuming run events from a queue with bounded concurrency
// ABOUTME: Retries failed attempts with backoff; unfinished runs resume from storage after a restart

use std::sync::Arc;
use std::time::Duration;

use codingcat_core::{RunOutcome, RunRequest};
use codingcat_storage::{RunRecord, RunStorage};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::error::{Result, WorkflowError};
use crate::workflow::CodingWorkflow;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from `base_delay`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Runs a single event to a terminal state, retrying within the policy
pub struct RunExecutor {
    workflow: Arc<CodingWorkflow>,
    runs: Arc<RunStorage>,
    retry: RetryPolicy,
}

impl RunExecutor {
    pub fn new(workflow: Arc<CodingWorkflow>, runs: Arc<RunStorage>, retry: RetryPolicy) -> Self {
        Self {
            workflow,
            runs,
            retry,
        }
    }

    pub fn runs(&self) -> &RunStorage {
        &self.runs
    }

    /// Drive the run until it completes or exhausts its attempts
    pub async fn process(&self, request: &RunRequest) -> Result<RunRecord> {
        let run_id = request.event_id.as_str();

        let existing = self.runs.get_run(run_id).await?;
        if existing.status.is_terminal() {
            info!(run_id = %run_id, status = %existing.status, "Run already finished, skipping");
            return Ok(existing);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        loop {
            let attempt = match self.runs.mark_running(run_id).await {
                Ok(attempt) => attempt,
                Err(e) => return Err(self.abandon(run_id, e.into(), None).await),
            };

            match self.workflow.execute(request).await {
                Ok(report) => {
                    if let Err(e) = self.runs.mark_completed(run_id, &report.message.id).await {
                        return Err(self
                            .abandon(run_id, e.into(), Some(&report.message.id))
                            .await);
                    }
                    info!(
                        run_id = %run_id,
                        attempt,
                        status = ?report.outcome.status,
                        iterations = report.iterations,
                        "Run completed"
                    );
                    break;
                }
                Err(e) if attempt < i64::from(max_attempts) => {
                    let delay = self.retry.delay_after(attempt as u32);
                    warn!(
                        run_id = %run_id,
                        attempt,
                        "Run attempt failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    if let Err(store_err) =
                        self.runs.record_attempt_error(run_id, &e.to_string()).await
                    {
                        return Err(self.abandon(run_id, store_err.into(), None).await);
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(run_id = %run_id, attempt, "Run failed after all attempts: {}", e);
                    self.give_up(request, &e).await?;
                    break;
                }
            }
        }

        Ok(self.runs.get_run(run_id).await?)
    }

    /// Run bookkeeping broke mid-flight. Mark the run failed so it does not stay `running`.
    async fn abandon(
        &self,
        run_id: &str,
        cause: WorkflowError,
        message_id: Option<&str>,
    ) -> WorkflowError {
        error!(run_id = %run_id, "Run bookkeeping failed: {}", cause);
        if let Err(e) = self
            .runs
            .mark_failed(run_id, &cause.to_string(), message_id)
            .await
        {
            error!(run_id = %run_id, "Failed to mark run as failed: {}", e);
        }
        cause
    }

    /// Persist the advisory message so a failed run is visible to the user
    async fn give_up(&self, request: &RunRequest, cause: &WorkflowError) -> Result<()> {
        let outcome = RunOutcome::failed(String::new());
        let message_id = match self
            .workflow
            .gateway()
            .persist(&request.project_id, &outcome)
            .await
        {
            Ok(message) => Some(message.id),
            Err(e) => {
                error!(run_id = %request.event_id, "Failed to persist advisory message: {}", e);
                None
            }
        };

        self.runs
            .mark_failed(&request.event_id, &cause.to_string(), message_id.as_deref())
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub max_concurrent_runs: usize,
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            queue_capacity: 256,
        }
    }
}

/// Handle used to submit run events
#[derive(Clone)]
pub struct RunDispatcher {
    sender: mpsc::Sender<RunRequest>,
    runs: Arc<RunStorage>,
    stop: Arc<watch::Sender<bool>>,
}

impl RunDispatcher {
    /// Start the worker task and return the submission handle
    pub fn start(executor: Arc<RunExecutor>, config: DispatcherConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (stop, stop_rx) = watch::channel(false);
        let runs = executor.runs.clone();
        let worker = tokio::spawn(worker_loop(
            executor,
            receiver,
            stop_rx,
            config.max_concurrent_runs.max(1),
        ));

        (
            Self {
                sender,
                runs,
                stop: Arc::new(stop),
            },
            worker,
        )
    }

    /// Register and enqueue a run. Returns `false` when the event id was already submitted.
    pub async fn send(&self, request: RunRequest) -> Result<bool> {
        let created = self
            .runs
            .create_run(&request.event_id, &request.project_id, &request.task_text)
            .await?;
        if !created {
            info!(run_id = %request.event_id, "Duplicate run event ignored");
            return Ok(false);
        }

        self.enqueue(request).await?;
        Ok(true)
    }

    /// Hand an already registered run to the worker
    pub async fn enqueue(&self, request: RunRequest) -> Result<()> {
        self.sender
            .send(request)
            .await
            .map_err(|e| WorkflowError::Queue(format!("dispatcher stopped: {}", e)))
    }

    /// Enqueue a run already stored as `queued`
    pub async fn enqueue_run(&self, run: RunRecord) -> Result<()> {
        self.enqueue(RunRequest {
            event_id: run.id,
            task_text: run.task,
            project_id: run.project_id,
        })
        .await
    }

    /// Re-enqueue every run left queued or running by a previous process.
    /// Completed steps replay from the step store, so work is not redone.
    pub async fn resume_unfinished(&self) -> Result<usize> {
        let unfinished = self.runs.list_unfinished().await?;
        let count = unfinished.len();

        for run in unfinished {
            info!(run_id = %run.id, status = %run.status, attempts = run.attempts, "Resuming run");
            self.enqueue_run(run).await?;
        }

        if count > 0 {
            info!(count, "Resumed unfinished runs");
        }
        Ok(count)
    }

    /// Stop taking runs off the queue and wait for in-flight runs to finish.
    /// Runs still waiting in the queue stay `queued` and resume on the next start.
    pub async fn shutdown(&self, worker: JoinHandle<()>) {
        self.stop.send_replace(true);
        if let Err(e) = worker.await {
            error!("Run dispatcher worker ended abnormally: {}", e);
        }
    }
}

async fn worker_loop(
    executor: Arc<RunExecutor>,
    mut receiver: mpsc::Receiver<RunRequest>,
    mut stop: watch::Receiver<bool>,
    max_concurrent_runs: usize,
) {
    let permits = Arc::new(Semaphore::new(max_concurrent_runs));
    let mut in_flight = JoinSet::new();
    info!(max_concurrent_runs, "Run dispatcher started");

    loop {
        let request = tokio::select! {
            biased;
            _ = stop.changed() => break,
            request = receiver.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = stop.changed() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        while let Some(finished) = in_flight.try_join_next() {
            if let Err(e) = finished {
                error!("Run task ended abnormally: {}", e);
            }
        }

        let executor = executor.clone();
        in_flight.spawn(async move {
            if let Err(e) = executor.process(&request).await {
                error!(run_id = %request.event_id, "Run ended with error: {}", e);
            }
            drop(permit);
        });
    }

    if !in_flight.is_empty() {
        info!(in_flight = in_flight.len(), "Waiting for in-flight runs");
    }
    while let Some(finished) = in_flight.join_next().await {
        if let Err(e) = finished {
            error!("Run task ended abnormally: {}", e);
        }
    }

    info!("Run dispatcher stopped");
}
