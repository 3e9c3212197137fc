// Domain Layer - Pure values: jobs and the parameter grid

pub mod error;
pub mod grid;
pub mod job;

// Re-exports
pub use error::DomainError;
pub use grid::{build_jobs, ModelSpec, ParameterGrid, Scenario};
pub use job::{Job, JobId};
