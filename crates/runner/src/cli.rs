//! Command-line arguments

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "simbatch")]
#[command(about = "Run a simulation parameter grid on a fixed-size process pool", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML). Defaults to ./simbatch.toml when present
    #[arg(short, long, env = "SIMBATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker pool size (maximum simulations running at once)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Iterations per (model, scenario) combination
    #[arg(short, long)]
    pub iterations: Option<u64>,

    /// Path to the simulator executable
    #[arg(short, long)]
    pub program: Option<PathBuf>,

    /// Directory the simulator is started in
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Only pass these environment variables to the simulator (repeatable or comma-separated)
    #[arg(long = "env-allow", value_name = "VAR", value_delimiter = ',')]
    pub env_allowlist: Vec<String>,

    /// Print the commands that would run and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for the final report
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    pub report_format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

impl Cli {
    /// Command-line flags win over every other configuration layer
    pub fn apply_overrides(&self, settings: &mut Settings) {
        let batch = &mut settings.batch;
        if let Some(workers) = self.workers {
            batch.workers = workers;
        }
        if let Some(iterations) = self.iterations {
            batch.grid.iterations_per_combination = iterations;
        }
        if let Some(program) = &self.program {
            batch.program = program.clone();
        }

        let executor = &mut settings.executor;
        if let Some(dir) = &self.working_dir {
            executor.working_dir = Some(dir.clone());
        }
        if !self.env_allowlist.is_empty() {
            executor.env_allowlist = Some(self.env_allowlist.clone());
        }
    }
}
