// Run Report - computed once after the pool has been joined

use crate::application::worker::WorkerStats;
use crate::domain::Scenario;
use crate::error::Result;
use serde::Serialize;

/// Summary of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Wall-clock start (epoch ms), taken just before the pool starts
    pub started_at_ms: i64,
    pub elapsed_secs: f64,
    pub job_count: u64,
    pub worker_count: usize,
    /// Workers that terminated normally after cancellation
    pub workers_joined: usize,
    pub iterations_per_combination: u64,
    pub models: Vec<String>,
    pub scenarios: Vec<Scenario>,
    pub outcomes: WorkerStats,
}

impl RunReport {
    /// Single human-readable line printed at the end of a run.
    ///
    /// Scenarios are written as `days/steps-per-day/seed-chance/render`.
    pub fn summary_line(&self) -> String {
        let scenarios: Vec<String> = self
            .scenarios
            .iter()
            .map(|s| {
                format!(
                    "{}d/{}/{}/{}",
                    s.sim_length_days,
                    s.time_steps_per_day,
                    s.seed_infection_chance,
                    s.iterations_per_render
                )
            })
            .collect();

        format!(
            "Took {:.3}s for {} iterations in batches of {} for the following inputs: [{}] x [{}]",
            self.elapsed_secs,
            self.iterations_per_combination,
            self.worker_count,
            self.models.join(", "),
            scenarios.join(", ")
        )
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport {
            started_at_ms: 1_700_000_000_000,
            elapsed_secs: 12.5,
            job_count: 40,
            worker_count: 10,
            workers_joined: 10,
            iterations_per_combination: 20,
            models: vec![
                "examples/isle_of_dogs".to_string(),
                "output/devon".to_string(),
            ],
            scenarios: vec![
                Scenario::default(),
                Scenario {
                    sim_length_days: 30,
                    ..Scenario::default()
                },
            ],
            outcomes: WorkerStats {
                executed: 40,
                succeeded: 39,
                non_zero_exits: 1,
                ..WorkerStats::default()
            },
        }
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(
            report().summary_line(),
            "Took 12.500s for 20 iterations in batches of 10 for the following inputs: \
             [examples/isle_of_dogs, output/devon] x [100d/24/0.0001/60, 30d/24/0.0001/60]"
        );
    }

    #[test]
    fn test_summary_line_tells_scenario_sets_apart() {
        let mut other = report();
        other.scenarios[1].seed_infection_chance = 0.5;
        assert_ne!(report().summary_line(), other.summary_line());
    }

    #[test]
    fn test_json_report_fields() {
        let json: serde_json::Value =
            serde_json::from_str(&report().to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["job_count"], 40);
        assert_eq!(json["worker_count"], 10);
        assert_eq!(json["workers_joined"], 10);
        assert_eq!(json["outcomes"]["non_zero_exits"], 1);
        assert_eq!(json["scenarios"][0]["time_steps_per_day"], 24);
    }
}
