//! Bounded worker pool running every task to a terminal outcome.
//!
//! # Concurrency Model
//!
//! - A fixed number of worker tasks is spawned on the Tokio runtime
//! - Workers pull tasks from one shared queue, one task at a time
//! - Attempts of a task run sequentially in a task spawned by its worker, so
//!   a panic is contained to that one task; different tasks run concurrently
//!   across workers
//! - Each terminal outcome is logged by the worker that produced it, then
//!   sent to the dispatcher, which collects outcomes in arrival order
//!
//! # Failure Semantics
//!
//! Per-task fetch failures never fail the run. An internal fault (outcome log
//! not writable, panic while attempting a task) is held by the worker that
//! hit it, which moves on to the next task. Every task is still attempted;
//! once all workers are done the first fault is returned to the caller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::logger::{LogError, ResultLogger};
use super::retry::{RetryPolicy, attempt_with_retry};
use super::{CancellationFlag, Task, TaskOutcome};
use crate::fetch::Fetcher;
use crate::progress::StatusSink;

/// Minimum allowed worker count.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed worker count.
const MAX_CONCURRENCY: usize = 64;

/// Default worker count.
pub const DEFAULT_THREADS: usize = 2;

/// Internal faults surfaced by [`Dispatcher::run_all`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Invalid worker count provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// An outcome could not be written to its log.
    #[error("outcome log error: {0}")]
    Log(#[from] LogError),

    /// A worker panicked.
    #[error("download worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Outcomes of one [`Dispatcher::run_all`] invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    outcomes: Vec<TaskOutcome>,
    skipped: usize,
}

impl RunSummary {
    /// Outcomes in the order tasks finished.
    #[must_use]
    pub fn outcomes(&self) -> &[TaskOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn into_outcomes(self) -> Vec<TaskOutcome> {
        self.outcomes
    }

    /// Number of tasks that downloaded.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_downloaded()).count()
    }

    /// Number of tasks that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.downloaded()
    }

    /// Number of retry attempts made across all tasks.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| o.attempts().saturating_sub(1) as usize)
            .sum()
    }

    /// Tasks never started because the run was cancelled.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Tasks that reached a terminal outcome.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// Runs tasks across a fixed-size worker pool.
pub struct Dispatcher {
    concurrency: usize,
    retry_policy: RetryPolicy,
    fetcher: Arc<dyn Fetcher>,
    logger: Arc<ResultLogger>,
    status: Arc<dyn StatusSink>,
    cancel: CancellationFlag,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("concurrency", &self.concurrency)
            .field("retry_policy", &self.retry_policy)
            .field("logger", &self.logger)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with `concurrency` workers.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-64).
    #[instrument(level = "debug", skip(retry_policy, fetcher, logger, status))]
    pub fn new(
        concurrency: usize,
        retry_policy: RetryPolicy,
        fetcher: Arc<dyn Fetcher>,
        logger: Arc<ResultLogger>,
        status: Arc<dyn StatusSink>,
    ) -> Result<Self, DispatchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(DispatchError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            base_delay_ms = retry_policy.base_delay().as_millis(),
            "creating dispatcher"
        );

        Ok(Self {
            concurrency,
            retry_policy,
            fetcher,
            logger,
            status,
            cancel: CancellationFlag::new(),
        })
    }

    /// Uses `cancel` to stop the run early.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs every task to a terminal outcome and returns the outcomes.
    ///
    /// Blocks until all workers have finished. Outcomes are logged by the
    /// workers as they happen.
    ///
    /// # Errors
    ///
    /// Returns the first [`DispatchError`] raised by a worker, after every
    /// other worker has finished. Fetch failures are not errors.
    #[instrument(skip(self, tasks), fields(tasks = tasks.len(), concurrency = self.concurrency))]
    pub async fn run_all(&self, tasks: Vec<Task>) -> Result<RunSummary, DispatchError> {
        let total = tasks.len();
        if total == 0 {
            debug!("no tasks to dispatch");
            return Ok(RunSummary::default());
        }

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for worker_id in 0..self.concurrency.min(total) {
            let worker = Worker {
                id: worker_id,
                queue: Arc::clone(&queue),
                fetcher: Arc::clone(&self.fetcher),
                logger: Arc::clone(&self.logger),
                status: Arc::clone(&self.status),
                retry_policy: self.retry_policy.clone(),
                cancel: self.cancel.clone(),
                outcomes: outcome_tx.clone(),
            };
            workers.spawn(worker.run());
        }
        // the channel closes once every worker has dropped its sender
        drop(outcome_tx);

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = outcome_rx.recv().await {
            debug!(url = %outcome.url(), done = outcomes.len() + 1, total, "task finished");
            outcomes.push(outcome);
        }

        let mut first_fault = None;
        while let Some(joined) = workers.join_next().await {
            let fault = match joined {
                Ok(None) => continue,
                Ok(Some(fault)) => fault,
                Err(join_error) => DispatchError::WorkerPanicked(join_error.to_string()),
            };
            first_fault.get_or_insert(fault);
        }

        let summary = RunSummary {
            skipped: total - outcomes.len(),
            outcomes,
        };
        info!(
            downloaded = summary.downloaded(),
            failed = summary.failed(),
            retried = summary.retried(),
            skipped = summary.skipped(),
            "dispatch complete"
        );

        match first_fault {
            Some(fault) => Err(fault),
            None => Ok(summary),
        }
    }
}

struct Worker {
    id: usize,
    queue: Arc<Mutex<VecDeque<Task>>>,
    fetcher: Arc<dyn Fetcher>,
    logger: Arc<ResultLogger>,
    status: Arc<dyn StatusSink>,
    retry_policy: RetryPolicy,
    cancel: CancellationFlag,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,
}

impl Worker {
    /// Drains the queue, returning the first internal fault seen.
    #[instrument(skip_all, fields(worker = self.id))]
    async fn run(self) -> Option<DispatchError> {
        let mut first_fault = None;
        loop {
            if self.cancel.is_cancelled() {
                debug!("cancellation requested, worker stopping");
                break;
            }
            let Some(task) = self.next_task() else {
                debug!("queue drained, worker stopping");
                break;
            };

            let url = task.url().to_string();
            if let Err(fault) = self.run_task(task).await {
                error!(url = %url, error = %fault, "internal fault, continuing with next task");
                first_fault.get_or_insert(fault);
            }
        }
        first_fault
    }

    async fn run_task(&self, task: Task) -> Result<(), DispatchError> {
        let fetcher = Arc::clone(&self.fetcher);
        let status = Arc::clone(&self.status);
        let policy = self.retry_policy.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            attempt_with_retry(
                fetcher.as_ref(),
                &task,
                &policy,
                status.as_ref(),
                &cancel,
            )
            .await
        });
        let outcome = handle
            .await
            .map_err(|join_error| DispatchError::WorkerPanicked(join_error.to_string()))?;

        match &outcome {
            TaskOutcome::Downloaded { url, attempts } => {
                info!(url = %url, attempts, "download completed");
            }
            TaskOutcome::Failed {
                url,
                reason,
                attempts,
            } => {
                warn!(url = %url, attempts, error = %reason, "skipped after failed attempts");
            }
        }

        self.logger.record(&outcome).await?;
        // the receiver outlives every worker
        let _ = self.outcomes.send(outcome);
        Ok(())
    }

    fn next_task(&self) -> Option<Task> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}
