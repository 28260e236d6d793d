//! Scheduling strategy for independent pipeline runs

use std::fmt;

/// How many independent runs may be in flight at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One run at a time, in order
    Sequential,

    /// Every run at once
    Parallel,

    /// Limited parallelism (max N concurrent runs)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Sequential
    }
}

impl SchedulingStrategy {
    /// Concurrency limit for `total` runs; never zero
    pub fn limit(&self, total: usize) -> usize {
        let limit = match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => total,
            SchedulingStrategy::LimitedParallel(max) => (*max).min(total),
        };
        limit.max(1)
    }
}

impl fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingStrategy::Sequential => f.write_str("sequential"),
            SchedulingStrategy::Parallel => f.write_str("parallel"),
            SchedulingStrategy::LimitedParallel(n) => write!(f, "parallel-limited({})", n),
        }
    }
}
