// Subprocess executor implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use simbatch_core::domain::Job;
use simbatch_core::port::task_executor::{
    ExecutionError, ExecutionResult, ExecutionStatus, TaskExecutor,
};
use simbatch_core::port::TimeProvider;

/// Subprocess executor
///
/// Spawns the job's program directly (no shell), captures stdout and stderr
/// through pipes and always reaps the child. There is no timeout: a hung
/// program keeps its worker busy until it exits.
pub struct SubprocessExecutor {
    time_provider: Arc<dyn TimeProvider>,
    working_dir: Option<PathBuf>,
    env_allowlist: Option<Vec<String>>,
}

impl SubprocessExecutor {
    /// Create a subprocess executor that inherits the current environment
    ///
    /// # Example
    /// ```ignore
    /// let executor = SubprocessExecutor::new(Arc::new(SystemTimeProvider))
    ///     .with_working_dir("/srv/outbreak");
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            working_dir: None,
            env_allowlist: None,
        }
    }

    /// Run every job from this directory instead of the current one
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Clear the child environment except for the listed variables
    pub fn with_env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = Some(allowlist);
        self
    }

    /// Environment passed to children when an allowlist is set
    fn filtered_env(&self) -> Option<Vec<(String, String)>> {
        self.env_allowlist.as_ref().map(|allow| {
            std::env::vars()
                .filter(|(k, _)| allow.contains(k))
                .collect()
        })
    }

    fn build_command(&self, program: &Path, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        if let Some(env) = self.filtered_env() {
            command.env_clear().envs(env);
        }
        command
    }

    /// Spawn child process and wait for output.
    ///
    /// `wait_with_output` drains both pipes concurrently with waiting for
    /// exit, so a chatty child cannot block on a full pipe buffer.
    async fn spawn_and_wait(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<std::process::Output, ExecutionError> {
        let child = self
            .build_command(program, args)
            .spawn()
            .map_err(|e| {
                ExecutionError::SpawnFailed(format!("{}: {}", program.display(), e))
            })?;

        child
            .wait_with_output()
            .await
            .map_err(|e| ExecutionError::IoError(e.to_string()))
    }

    /// Build execution result from process output
    fn build_result(&self, output: std::process::Output, duration_ms: i64) -> ExecutionResult {
        let status = match output.status.code() {
            Some(0) => ExecutionStatus::Success,
            Some(_) => ExecutionStatus::NonZeroExit,
            None => ExecutionStatus::Terminated,
        };

        ExecutionResult {
            status,
            exit_code: output.status.code(),
            duration_ms,
            stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        }
    }
}

#[async_trait]
impl TaskExecutor for SubprocessExecutor {
    async fn execute(&self, job: &Job) -> Result<ExecutionResult, ExecutionError> {
        let start_time = self.time_provider.now_millis();

        debug!(
            job_id = %job.id(),
            program = %job.program().display(),
            args = ?job.args(),
            "Starting subprocess"
        );

        let output = self.spawn_and_wait(job.program(), job.args()).await?;

        let duration_ms = self.time_provider.now_millis() - start_time;
        let result = self.build_result(output, duration_ms);

        debug!(
            job_id = %job.id(),
            duration_ms = %duration_ms,
            exit_code = ?result.exit_code,
            status = ?result.status,
            "Subprocess exited"
        );

        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use simbatch_core::port::time_provider::SystemTimeProvider;

    fn executor() -> SubprocessExecutor {
        SubprocessExecutor::new(Arc::new(SystemTimeProvider))
    }

    fn sh(id: u64, script: &str) -> Job {
        Job::new_test(id, "sh", &["-c", script])
    }

    #[tokio::test]
    async fn test_execute_success() {
        let job = Job::new_test(1, "echo", &["hello"]);
        let result = executor().execute(&job).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.unwrap_or_default().contains("hello"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_a_result() {
        let result = executor().execute(&sh(1, "exit 3")).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::NonZeroExit);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.exit_label(), "3");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let job = Job::new_test(1, "/nonexistent/outbreak-sim", &["envs", "devon", "0"]);
        let result = executor().execute(&job).await;

        match result {
            Err(ExecutionError::SpawnFailed(msg)) => {
                assert!(msg.contains("/nonexistent/outbreak-sim"))
            }
            other => panic!("expected spawn failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_large_output_on_both_streams_does_not_deadlock() {
        // Well past the default 64 KiB pipe buffer on each stream
        let script = "head -c 300000 /dev/zero | tr '\\0' x; \
                      head -c 300000 /dev/zero | tr '\\0' y >&2";
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            executor().execute(&sh(1, script)),
        )
        .await
        .expect("child must not block on a full pipe")
        .unwrap();

        assert_eq!(result.stdout.unwrap().len(), 300_000);
        assert_eq!(result.stderr.unwrap().len(), 300_000);
    }

    #[tokio::test]
    async fn test_killed_by_signal_has_no_exit_code() {
        let result = executor().execute(&sh(1, "kill -9 $$")).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Terminated);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.exit_label(), "signal");
    }

    #[tokio::test]
    async fn test_working_dir_is_applied() {
        let dir = std::env::temp_dir();
        let result = executor()
            .with_working_dir(&dir)
            .execute(&Job::new_test(1, "pwd", &[]))
            .await
            .unwrap();

        let printed = PathBuf::from(result.stdout.unwrap().trim());
        assert_eq!(
            printed.canonicalize().unwrap(),
            dir.canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_env_allowlist_filters_child_environment() {
        std::env::set_var("SIMBATCH_TEST_ALLOWED", "yes");
        std::env::set_var("SIMBATCH_TEST_BLOCKED", "no");

        let executor = executor().with_env_allowlist(vec![
            "PATH".to_string(),
            "SIMBATCH_TEST_ALLOWED".to_string(),
        ]);
        let result = executor
            .execute(&sh(
                1,
                "echo \"${SIMBATCH_TEST_ALLOWED:-unset}/${SIMBATCH_TEST_BLOCKED:-unset}\"",
            ))
            .await
            .unwrap();

        assert_eq!(result.stdout.unwrap().trim(), "yes/unset");
    }
}
