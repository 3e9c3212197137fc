// Application Layer - Work queue, worker pool and batch lifecycle

pub mod queue;
pub mod report;
pub mod supervisor;
pub mod worker;

// Re-exports
pub use queue::{QueueError, QueueStats, WorkQueue};
pub use report::RunReport;
pub use supervisor::{BatchConfig, RunSupervisor};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerStats};
