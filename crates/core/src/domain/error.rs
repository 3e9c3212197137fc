// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Parameter grid has no models")]
    NoModels,

    #[error("Parameter grid has no scenarios")]
    NoScenarios,

    #[error("Invalid model at index {index}: {reason}")]
    InvalidModel { index: usize, reason: String },

    #[error("Invalid scenario at index {index}: {reason}")]
    InvalidScenario { index: usize, reason: String },

    #[error("Iteration index overflow for combination {combination}")]
    IterationOverflow { combination: usize },
}

pub type Result<T> = std::result::Result<T, DomainError>;
