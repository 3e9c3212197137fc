// Worker pool constants (No magic values)

/// Pool size when none is configured
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Iterations run for every (model, scenario) combination when none is configured
pub const DEFAULT_ITERATIONS_PER_COMBINATION: u64 = 20;

/// External simulator invoked for every job when none is configured
pub const DEFAULT_PROGRAM: &str = "./target/release/outbreak-sim";
