//! Batch configuration loading
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults (the reference model set)
//! 2. TOML file (`--config`, or `simbatch.toml` in the working directory if present)
//! 3. Environment variables prefixed `SIMBATCH_` (`__` separates nested keys,
//!    e.g. `SIMBATCH_GRID__ITERATIONS_PER_COMBINATION=5`,
//!    `SIMBATCH_EXECUTOR__ENV_ALLOWLIST=PATH,HOME`)
//! 4. Command-line overrides, applied by the caller
//!
//! The `[executor]` table configures how processes are started and is kept
//! apart from the batch itself.

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use simbatch_core::application::BatchConfig;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "SIMBATCH";
pub const DEFAULT_CONFIG_FILE: &str = "simbatch.toml";

/// Reference grid: six synthetic environments, one scenario, 20 iterations, pool of 10
pub const DEFAULT_CONFIG: &str = r#"
program = "./target/release/outbreak-sim"
workers = 10

[grid]
iterations_per_combination = 20

[[grid.models]]
env_dir = "python/synthetic_environments/examples"
name = "isle_of_dogs"

[[grid.models]]
env_dir = "python/synthetic_environments/examples"
name = "isle_of_wight"

[[grid.models]]
env_dir = "python/synthetic_environments/examples"
name = "greater_manchester"

[[grid.models]]
env_dir = "python/synthetic_environments/output"
name = "devon"

[[grid.models]]
env_dir = "python/synthetic_environments/output"
name = "wales"

[[grid.models]]
env_dir = "python/synthetic_environments/output"
name = "london_se_commuter_ring"

[[grid.scenarios]]
sim_length_days = 100
time_steps_per_day = 24
seed_infection_chance = 0.0001
iterations_per_render = 60
"#;

/// Process start-up settings for the subprocess executor
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutorConfig {
    /// Directory every job is started in
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// When set, children only see these environment variables
    #[serde(default)]
    pub env_allowlist: Option<Vec<String>>,
}

/// Everything the runner loads before wiring
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub batch: BatchConfig,
    pub executor: ExecutorConfig,
}

/// Load configuration from defaults, the optional file and `SIMBATCH_*` variables
pub fn load(path: Option<&Path>) -> Result<Settings> {
    load_with_env_prefix(path, ENV_PREFIX)
}

pub(crate) fn load_with_env_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Settings> {
    let mut builder =
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

    builder = match path {
        Some(p) => builder.add_source(File::from(p).format(FileFormat::Toml).required(true)),
        None => builder.add_source(
            File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        ),
    };

    let settings = builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("executor.env_allowlist"),
        )
        .build()
        .context("Failed to read configuration")?;

    let executor = match settings.get::<ExecutorConfig>("executor") {
        Ok(executor) => executor,
        Err(ConfigError::NotFound(_)) => ExecutorConfig::default(),
        Err(e) => return Err(e).context("Invalid executor configuration"),
    };
    let batch = settings
        .try_deserialize::<BatchConfig>()
        .context("Invalid configuration")?;

    Ok(Settings { batch, executor })
}
