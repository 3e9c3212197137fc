// Task Executor Port
// Abstraction over "run this command, return exit status and captured output"

use crate::domain::Job;
use async_trait::async_trait;
use thiserror::Error;

/// Result of task execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExecutionResult {
    /// Exit code as shown in status lines (`signal` when the process had none)
    pub fn exit_label(&self) -> String {
        match self.exit_code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// Execution status
///
/// A non-zero exit is data, not an error: the job still counts as completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    NonZeroExit,
    /// Terminated without an exit code (signal on unix)
    Terminated,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

/// Task Executor trait
///
/// Implementations:
/// - SubprocessExecutor: spawns the external program (infra-system crate)
/// - MockTaskExecutor: scripted outcomes for tests
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the job's program to completion and collect its output
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the program cannot be started
    /// - ExecutionError::IoError if waiting on the process or its pipes fails
    async fn execute(&self, job: &Job) -> Result<ExecutionResult, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobId;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always exit 0
        Success,
        /// Always exit with the given code
        ExitCode(i32),
        /// Exit with `code` for the listed jobs, 0 otherwise
        FailJobs(Vec<JobId>, i32),
        /// Always fail to spawn
        SpawnFail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Sleep before exiting 0
        Delay(Duration),
        /// Block until a permit is added to the semaphore, then exit 0
        Gated(Arc<Semaphore>),
    }

    /// Mock Task Executor for testing
    pub struct MockTaskExecutor {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
        executed: Arc<Mutex<Vec<JobId>>>,
    }

    impl MockTaskExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
                executed: Arc::new(Mutex::new(Vec::new())),
            }
        }
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }
        pub fn new_exit_code(code: i32) -> Self {
            Self::new(MockBehavior::ExitCode(code))
        }
        pub fn new_spawn_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::SpawnFail(message.into()))
        }
        pub fn new_gated(gate: Arc<Semaphore>) -> Self {
            Self::new(MockBehavior::Gated(gate))
        }
        /// Number of execute calls that have started
        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
        /// Jobs in the order their execution started
        pub fn executed(&self) -> Vec<JobId> {
            self.executed.lock().unwrap().clone()
        }

        fn exited(code: i32) -> ExecutionResult {
            ExecutionResult {
                status: if code == 0 {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::NonZeroExit
                },
                duration_ms: 1,
                exit_code: Some(code),
                stdout: Some("mock output".to_string()),
                stderr: None,
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for MockTaskExecutor {
        async fn execute(&self, job: &Job) -> Result<ExecutionResult, ExecutionError> {
            *self.call_count.lock().unwrap() += 1;
            self.executed.lock().unwrap().push(job.id());

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success => Ok(Self::exited(0)),
                MockBehavior::ExitCode(code) => Ok(Self::exited(code)),
                MockBehavior::FailJobs(ids, code) => {
                    if ids.contains(&job.id()) {
                        Ok(Self::exited(code))
                    } else {
                        Ok(Self::exited(0))
                    }
                }
                MockBehavior::SpawnFail(msg) => Err(ExecutionError::SpawnFailed(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                MockBehavior::Delay(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(Self::exited(0))
                }
                MockBehavior::Gated(gate) => {
                    let permit = gate
                        .acquire()
                        .await
                        .map_err(|e| ExecutionError::IoError(e.to_string()))?;
                    permit.forget();
                    Ok(Self::exited(0))
                }
            }
        }
    }
}
