//! ci-gate - fan a CI job matrix out, fan every leg back into one status

pub mod cli;
pub mod core;
pub mod execution;
pub mod gate;

// Re-export commonly used types
pub use core::{JobOutcome, JobResult, JobSpec, Pipeline};
pub use execution::{ExecutionEngine, ExecutionEvent, RunReport, SchedulingStrategy};
pub use gate::{AggregateOutcome, Aggregator, Decision, GateError};
