//! CLI command definitions

use clap::Args;
use crate::execution::SchedulingStrategy;

/// Decide the gate from results injected by the orchestrator
#[derive(Debug, Args, Clone, Default)]
pub struct CheckCommand {
    /// Read results from a needs-context JSON file instead of $CI_GATE_NEEDS
    #[arg(long)]
    pub results: Option<String>,

    /// Take the declared prerequisites from this pipeline file
    #[arg(long)]
    pub pipeline: Option<String>,

    /// Print the decision as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the job matrix locally, then decide the gate
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Concurrency limit for the parallel-limited strategy
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Where commands run
    #[arg(long, value_enum, default_value_t = RuntimeArg::Host)]
    pub runtime: RuntimeArg,

    /// Working directory (mounted at /workspace for container runtimes)
    #[arg(long, default_value = ".")]
    pub workdir: String,

    /// Commit message checked against the trigger filter (default: $CI_COMMIT_MESSAGE)
    #[arg(long)]
    pub commit_message: Option<String>,

    /// Write job results as needs-context JSON
    #[arg(long)]
    pub results_out: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List the jobs a pipeline expands to
#[derive(Debug, Args, Clone)]
pub struct MatrixCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    pub fn into_strategy(self, max_parallel: usize) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(max_parallel),
        }
    }
}

/// Command runtime argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RuntimeArg {
    /// Run commands with `sh -c` on this machine
    Host,
    Docker,
    Podman,
}

impl RuntimeArg {
    /// Container runtime executable, `None` for the host
    pub fn executable(self) -> Option<&'static str> {
        match self {
            RuntimeArg::Host => None,
            RuntimeArg::Docker => Some("docker"),
            RuntimeArg::Podman => Some("podman"),
        }
    }
}
