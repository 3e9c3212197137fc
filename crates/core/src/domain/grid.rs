// Parameter Grid & Job Source
//
// Pure function from grid to ordered jobs. No I/O, no concurrency.

use super::error::{DomainError, Result};
use super::job::{Job, JobId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A synthetic environment: directory holding the model plus the model name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub env_dir: String,
    pub name: String,
}

impl ModelSpec {
    pub fn new(env_dir: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            env_dir: env_dir.into(),
            name: name.into(),
        }
    }
}

/// Simulation parameters passed through verbatim as `--flag=value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub sim_length_days: u32,
    pub time_steps_per_day: u32,
    pub seed_infection_chance: f64,
    #[serde(default = "default_iterations_per_render")]
    pub iterations_per_render: u32,
}

fn default_iterations_per_render() -> u32 {
    60
}

impl Scenario {
    /// Flags understood by the external simulator, in a stable order
    pub fn to_flags(&self) -> Vec<String> {
        vec![
            format!("--time-steps-per-day={}", self.time_steps_per_day),
            format!("--sim-length-days={}", self.sim_length_days),
            format!("--iterations-per-render={}", self.iterations_per_render),
            format!("--seed-infection-chance={}", self.seed_infection_chance),
        ]
    }

    fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: &str| DomainError::InvalidScenario {
            index,
            reason: reason.to_string(),
        };
        if self.sim_length_days == 0 {
            return Err(invalid("sim_length_days must be positive"));
        }
        if self.time_steps_per_day == 0 {
            return Err(invalid("time_steps_per_day must be positive"));
        }
        if self.iterations_per_render == 0 {
            return Err(invalid("iterations_per_render must be positive"));
        }
        if !self.seed_infection_chance.is_finite()
            || !(0.0..=1.0).contains(&self.seed_infection_chance)
        {
            return Err(invalid("seed_infection_chance must be within [0, 1]"));
        }
        Ok(())
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            sim_length_days: 100,
            time_steps_per_day: 24,
            seed_infection_chance: 0.0001,
            iterations_per_render: default_iterations_per_render(),
        }
    }
}

/// Models crossed with scenarios, each combination run `iterations_per_combination` times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub models: Vec<ModelSpec>,
    pub scenarios: Vec<Scenario>,
    pub iterations_per_combination: u64,
}

impl ParameterGrid {
    /// Number of (model, scenario) combinations
    pub fn combination_count(&self) -> usize {
        self.models.len() * self.scenarios.len()
    }

    /// Total number of jobs the grid expands to
    pub fn job_count(&self) -> u64 {
        (self.combination_count() as u64).saturating_mul(self.iterations_per_combination)
    }

    /// Model identifiers in grid order, as `env_dir/name`
    pub fn model_identifiers(&self) -> Vec<String> {
        self.models
            .iter()
            .map(|m| format!("{}/{}", m.env_dir, m.name))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(DomainError::NoModels);
        }
        if self.scenarios.is_empty() {
            return Err(DomainError::NoScenarios);
        }
        for (index, model) in self.models.iter().enumerate() {
            if model.env_dir.trim().is_empty() {
                return Err(DomainError::InvalidModel {
                    index,
                    reason: "env_dir is empty".to_string(),
                });
            }
            if model.name.trim().is_empty() {
                return Err(DomainError::InvalidModel {
                    index,
                    reason: "name is empty".to_string(),
                });
            }
        }
        for (index, scenario) in self.scenarios.iter().enumerate() {
            scenario.validate(index)?;
        }
        // Every iteration index must fit, including the last combination's range
        (self.combination_count() as u64)
            .checked_mul(self.iterations_per_combination)
            .ok_or(DomainError::IterationOverflow {
                combination: self.combination_count() - 1,
            })?;
        Ok(())
    }
}

/// Expand the grid into one job per (model, scenario, iteration).
///
/// Combination `k = model_index * scenarios.len() + scenario_index` owns the
/// iteration range `[k * I, (k + 1) * I)`, so iteration indices are unique
/// across the whole batch. The simulator keys its output on that index.
pub fn build_jobs(grid: &ParameterGrid, program: &Path) -> Result<Vec<Job>> {
    grid.validate()?;

    let per_combination = grid.iterations_per_combination;
    let mut jobs = Vec::new();
    let mut next_id = 0u64;

    for (model_index, model) in grid.models.iter().enumerate() {
        for (scenario_index, scenario) in grid.scenarios.iter().enumerate() {
            let combination = model_index * grid.scenarios.len() + scenario_index;
            let offset = (combination as u64)
                .checked_mul(per_combination)
                .ok_or(DomainError::IterationOverflow { combination })?;
            let flags = scenario.to_flags();

            for i in 0..per_combination {
                let iteration = offset
                    .checked_add(i)
                    .ok_or(DomainError::IterationOverflow { combination })?;

                let mut args = Vec::with_capacity(3 + flags.len());
                args.push(model.env_dir.clone());
                args.push(model.name.clone());
                args.push(iteration.to_string());
                args.extend(flags.iter().cloned());

                jobs.push(Job::new(
                    JobId(next_id),
                    program,
                    args,
                    model.name.clone(),
                    scenario_index,
                    iteration,
                ));
                next_id += 1;
            }
        }
    }

    Ok(jobs)
}
