//! Job executor - runs one job's commands in order

use crate::{
    core::{JobOutcome, JobResult, JobSpec},
    execution::runner::CommandRunner,
};
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Lines of command output kept in a failure detail
const DETAIL_TAIL_LINES: usize = 5;

/// Executes a single job
pub struct JobExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> JobExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Execute a job and return its terminal result.
    ///
    /// The first failing command stops the job. A job still running when
    /// `cancel` flips to `true` is reported `Cancelled`; its subprocess is
    /// killed when the command future is dropped.
    pub async fn execute(&self, job: &JobSpec, mut cancel: watch::Receiver<bool>) -> JobResult {
        let started_at = Utc::now();

        if *cancel.borrow_and_update() {
            return JobResult::cancelled(&job.name).with_detail("run cancelled before start");
        }

        info!("Executing job: {}", job.name);

        let result = tokio::select! {
            result = timeout(Duration::from_secs(job.timeout_secs), self.run_commands(job)) => {
                match result {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Job {} timed out after {}s", job.name, job.timeout_secs);
                        JobResult::failure(&job.name)
                            .with_detail(format!("timed out after {}s", job.timeout_secs))
                    }
                }
            }
            _ = cancelled(&mut cancel) => {
                warn!("Job {} cancelled", job.name);
                JobResult::cancelled(&job.name).with_detail("run cancelled")
            }
        };

        result.with_timing(started_at, Utc::now())
    }

    async fn run_commands(&self, job: &JobSpec) -> JobResult {
        for (index, command) in job.commands.iter().enumerate() {
            debug!("[{}] step {}/{}: {}", job.name, index + 1, job.commands.len(), command);

            let output = match self.runner.run(command, &job.context).await {
                Ok(output) => output,
                Err(e) => return JobResult::failure(&job.name).with_detail(e.to_string()),
            };

            if !output.success() {
                let mut detail = format!("`{}` exited with code {}", command, output.exit_code);
                let tail = output.tail(DETAIL_TAIL_LINES);
                if !tail.is_empty() {
                    detail.push('\n');
                    detail.push_str(&tail);
                }
                return JobResult::new(&job.name, JobOutcome::from_exit_code(output.exit_code))
                    .with_detail(detail);
            }
        }

        JobResult::success(&job.name)
    }
}

/// Resolves once the cancel flag is set; never resolves if the sender is gone
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
