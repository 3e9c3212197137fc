// Worker - Job execution loop
//
// State machine: IDLE -> EXECUTING -> IDLE -> ... -> CANCELLED
// Cancellation is only honoured while IDLE. A job that has been dequeued
// always runs to completion and is acknowledged.

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::queue::WorkQueue;
use crate::domain::Job;
use crate::error::Result;
use crate::port::{ExecutionError, ExecutionResult, ExecutionStatus, TaskExecutor};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-worker outcome counts, merged by the supervisor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub executed: u64,
    pub succeeded: u64,
    pub non_zero_exits: u64,
    pub terminated: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.executed += other.executed;
        self.succeeded += other.succeeded;
        self.non_zero_exits += other.non_zero_exits;
        self.terminated += other.terminated;
        self.failed += other.failed;
        self.panicked += other.panicked;
    }

    fn record(&mut self, outcome: &Outcome) {
        self.executed += 1;
        match outcome {
            Outcome::Exited(result) => match result.status {
                ExecutionStatus::Success => self.succeeded += 1,
                ExecutionStatus::NonZeroExit => self.non_zero_exits += 1,
                ExecutionStatus::Terminated => self.terminated += 1,
            },
            Outcome::Failed(ExecutionError::Panicked(_)) => self.panicked += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

enum Outcome {
    Exited(ExecutionResult),
    Failed(ExecutionError),
}

/// Worker pulls jobs from the shared queue until cancelled
pub struct Worker {
    id: usize,
    queue: Arc<WorkQueue>,
    task_executor: Arc<dyn TaskExecutor>,
}

impl Worker {
    pub fn new(id: usize, queue: Arc<WorkQueue>, task_executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            id,
            queue,
            task_executor,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run worker loop until the shutdown token fires.
    ///
    /// Only a queue invariant violation ends the loop with an error.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<WorkerStats> {
        debug!(worker_id = self.id, "Worker started");
        let mut stats = WorkerStats::default();

        loop {
            // Safe re-entry point: nothing is checked out here
            if shutdown.is_shutdown() {
                break;
            }

            let job = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    debug!(worker_id = self.id, "Worker interrupted during idle");
                    break;
                }
                job = self.queue.dequeue() => job,
            };

            let outcome = self.execute(job).await;
            stats.record(&outcome);
            self.queue.acknowledge()?;
        }

        debug!(
            worker_id = self.id,
            executed = stats.executed,
            "Worker stopped"
        );
        Ok(stats)
    }

    /// Execute one job with panic isolation, logging its status line
    async fn execute(&self, job: Job) -> Outcome {
        let job = Arc::new(job);
        let job_for_exec = Arc::clone(&job);
        let task_executor = Arc::clone(&self.task_executor);

        debug!(
            worker_id = self.id,
            job_id = %job.id(),
            command = %job.command_line(),
            "Executing job"
        );

        // Spawned so that a panicking executor cannot take the worker down
        let handle =
            tokio::task::spawn(async move { task_executor.execute(&job_for_exec).await });

        let outcome = match handle.await {
            Ok(Ok(result)) => Outcome::Exited(result),
            Ok(Err(e)) => Outcome::Failed(e),
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "execution task cancelled".to_string()
                };
                Outcome::Failed(ExecutionError::Panicked(message))
            }
        };

        match &outcome {
            Outcome::Exited(result) => {
                info!(
                    worker_id = self.id,
                    job_id = %job.id(),
                    exit_code = ?result.exit_code,
                    duration_ms = result.duration_ms,
                    "[{} exited with {}]",
                    job.command_line(),
                    result.exit_label()
                );
                if let Some(stdout) = result.stdout.as_deref().filter(|s| !s.is_empty()) {
                    debug!(job_id = %job.id(), "[stdout]\n{}", stdout);
                }
                if let Some(stderr) = result.stderr.as_deref().filter(|s| !s.is_empty()) {
                    debug!(job_id = %job.id(), "[stderr]\n{}", stderr);
                }
            }
            Outcome::Failed(ExecutionError::Panicked(msg)) => {
                error!(
                    worker_id = self.id,
                    job_id = %job.id(),
                    panic_msg = %msg,
                    "[{} panicked]",
                    job.command_line()
                );
            }
            Outcome::Failed(e) => {
                warn!(
                    worker_id = self.id,
                    job_id = %job.id(),
                    error = %e,
                    "[{} failed to run]",
                    job.command_line()
                );
            }
        }

        outcome
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
