//! Execution scheduler - decides how many jobs run at once

/// Strategy for scheduling job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute jobs in declaration order, one at a time
    Sequential,

    /// Execute all jobs in parallel
    #[default]
    Parallel,

    /// Limited parallelism (max N concurrent jobs)
    LimitedParallel(usize),
}

/// Scheduler for the matrix fan-out
///
/// Jobs have no mutual ordering; the scheduler only bounds how many run at
/// once. Workers pick jobs up in declaration order.
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    /// Number of jobs allowed to run at the same time
    pub fn concurrency(&self, job_count: usize) -> usize {
        let limit = match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => job_count,
            SchedulingStrategy::LimitedParallel(max) => max.min(job_count),
        };
        limit.max(1)
    }
}
