// Run Supervisor - orchestrates one batch from grid to report
//
// Lifecycle (strictly ordered):
//   build jobs -> enqueue all -> start clock -> start N workers
//   -> wait for drain -> stop clock -> cancel -> join N workers -> report

use crate::application::queue::WorkQueue;
use crate::application::report::RunReport;
use crate::application::worker::constants::{DEFAULT_PROGRAM, DEFAULT_WORKER_COUNT};
use crate::application::worker::{shutdown_channel, Worker, WorkerStats};
use crate::domain::{build_jobs, Job, ParameterGrid};
use crate::error::{AppError, Result};
use crate::port::{TaskExecutor, TimeProvider};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Everything one batch run needs, constructed once and passed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_program")]
    pub program: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub grid: ParameterGrid,
}

fn default_program() -> PathBuf {
    PathBuf::from(DEFAULT_PROGRAM)
}

fn default_workers() -> usize {
    DEFAULT_WORKER_COUNT
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AppError::Config("workers must be at least 1".to_string()));
        }
        if self.program.as_os_str().is_empty() {
            return Err(AppError::Config("program path is empty".to_string()));
        }
        self.grid.validate()?;
        Ok(())
    }
}

/// Run Supervisor (owns the pool for the duration of one batch)
pub struct RunSupervisor {
    config: BatchConfig,
    task_executor: Arc<dyn TaskExecutor>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RunSupervisor {
    pub fn new(
        config: BatchConfig,
        task_executor: Arc<dyn TaskExecutor>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            task_executor,
            time_provider,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Build the job list without running anything
    pub fn plan(&self) -> Result<Vec<Job>> {
        self.config.validate()?;
        Ok(build_jobs(&self.config.grid, &self.config.program)?)
    }

    /// Run the whole batch and report.
    ///
    /// Per-job failures never surface here. Errors mean the batch could not
    /// be built or the queue invariant was broken.
    pub async fn run(&self) -> Result<RunReport> {
        // 1-2. Build and enqueue everything before any concurrency starts
        let jobs = self.plan()?;
        let job_count = jobs.len() as u64;
        let queue = Arc::new(WorkQueue::new());
        for job in jobs {
            queue.enqueue(job);
        }

        info!(
            jobs = job_count,
            workers = self.config.workers,
            program = %self.config.program.display(),
            "Starting batch"
        );

        // 3. Start clock
        let started_at_ms = self.time_provider.now_millis();
        let started = Instant::now();

        // 4. Start pool
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            let worker = Worker::new(id, Arc::clone(&queue), Arc::clone(&self.task_executor));
            let token = shutdown_rx.clone();
            workers.spawn(async move { worker.run(token).await });
        }

        // 5. Wait for drain. A worker only exits early on an invariant violation.
        tokio::select! {
            _ = queue.wait_until_drained() => {}
            Some(joined) = workers.join_next() => {
                // Workers finish their in-flight jobs, so no child outlives the batch
                shutdown_tx.shutdown();
                join_workers(&mut workers).await;
                return Err(early_exit_error(joined));
            }
        }

        // 6. Stop clock
        let elapsed = started.elapsed();

        // 7. Cancel
        shutdown_tx.shutdown();

        // 8. Join all workers
        let pool = join_workers(&mut workers).await;
        if let Some(e) = pool.error {
            return Err(e);
        }
        let outcomes = pool.outcomes;

        // Every job acknowledged exactly once, or something is badly wrong
        let stats = queue.stats();
        if !stats.is_drained() || stats.acknowledged != job_count || outcomes.executed != job_count
        {
            return Err(AppError::InvalidState(format!(
                "queue not drained after join: {:?}, executed {}",
                stats, outcomes.executed
            )));
        }

        // 9. Report
        let report = RunReport {
            started_at_ms,
            elapsed_secs: elapsed.as_secs_f64(),
            job_count,
            worker_count: self.config.workers,
            workers_joined: pool.joined,
            iterations_per_combination: self.config.grid.iterations_per_combination,
            models: self.config.grid.model_identifiers(),
            scenarios: self.config.grid.scenarios.clone(),
            outcomes,
        };

        info!(
            elapsed_secs = report.elapsed_secs,
            succeeded = outcomes.succeeded,
            non_zero_exits = outcomes.non_zero_exits,
            terminated = outcomes.terminated,
            failed = outcomes.failed,
            panicked = outcomes.panicked,
            workers_joined = pool.joined,
            "Batch complete"
        );

        Ok(report)
    }
}

/// Result of joining the whole pool
struct PoolJoin {
    outcomes: WorkerStats,
    /// Workers that returned normally after cancellation
    joined: usize,
    /// First queue error returned by a worker
    error: Option<AppError>,
}

/// Join every worker after cancellation, merging their counts.
///
/// Always waits for the whole set, so in-flight jobs finish and their
/// processes are reaped even when one worker returns an error. Panics of a
/// worker task are logged, not propagated.
async fn join_workers(workers: &mut JoinSet<Result<WorkerStats>>) -> PoolJoin {
    let mut pool = PoolJoin {
        outcomes: WorkerStats::default(),
        joined: 0,
        error: None,
    };

    while let Some(result) = workers.join_next().await {
        match result {
            Ok(Ok(stats)) => {
                pool.outcomes.merge(&stats);
                pool.joined += 1;
            }
            Ok(Err(e)) => {
                error!(error = %e, "Worker stopped with an error");
                if pool.error.is_none() {
                    pool.error = Some(e);
                }
            }
            Err(join_err) => {
                error!(error = %join_err, "Worker task failed during shutdown");
            }
        }
    }

    debug!(workers = pool.joined, "All workers joined");
    pool
}

fn early_exit_error(joined: std::result::Result<Result<WorkerStats>, JoinError>) -> AppError {
    match joined {
        Ok(Err(e)) => e,
        Ok(Ok(_)) => AppError::InvalidState("worker stopped before the queue drained".to_string()),
        Err(join_err) => AppError::InvalidState(format!("worker task failed: {}", join_err)),
    }
}
