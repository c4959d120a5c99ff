//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod runner;
pub mod scheduler;

pub use engine::{CancelHandle, ExecutionEngine, ExecutionEvent, RunReport};
pub use executor::JobExecutor;
pub use runner::{CommandOutput, CommandRunner, ContainerRunner, RunnerError, ShellRunner};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
