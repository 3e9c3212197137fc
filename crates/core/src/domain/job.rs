// Job Domain Model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Job ID (position in the batch, assigned by the job source)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One fully-specified invocation of the external simulation program.
///
/// Jobs are immutable once built. The queue owns a job while it is pending,
/// exactly one worker owns it while it executes, and it is dropped after
/// the worker acknowledges it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    program: PathBuf,
    args: Vec<String>,

    // Grid coordinates (informational, never read by the executor)
    model: String,
    scenario_index: usize,
    iteration: u64,
}

impl Job {
    pub fn new(
        id: JobId,
        program: impl Into<PathBuf>,
        args: Vec<String>,
        model: impl Into<String>,
        scenario_index: usize,
        iteration: u64,
    ) -> Self {
        Self {
            id,
            program: program.into(),
            args,
            model: model.into(),
            scenario_index,
            iteration,
        }
    }

    /// Create a bare job for testing (no grid coordinates)
    pub fn new_test(id: u64, program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self::new(
            JobId(id),
            program,
            args.iter().map(|a| a.to_string()).collect(),
            "test",
            0,
            id,
        )
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn scenario_index(&self) -> usize {
        self.scenario_index
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Space-joined command line, used in status lines and dry runs
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}
