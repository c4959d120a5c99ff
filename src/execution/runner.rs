//! Command runners - host shell or container runtime subprocesses

use crate::core::ExecutionContext;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors raised while running a single command
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("Job declares no image but the runner requires one")]
    NoImage,
}

/// Captured result of one command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, -1 when the process was killed by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last `n` non-empty lines of stderr, falling back to stdout
    pub fn tail(&self, n: usize) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        lines[lines.len().saturating_sub(n)..].join("\n")
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command to completion inside `context`
    async fn run(&self, command: &str, context: &ExecutionContext) -> Result<CommandOutput, RunnerError>;
}

/// Runs commands with `sh -c` on the host; the image is informational
#[derive(Debug, Clone)]
pub struct ShellRunner {
    workdir: PathBuf,
}

impl ShellRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, context: &ExecutionContext) -> Result<CommandOutput, RunnerError> {
        debug!("sh -c {:?} in {}", command, self.workdir.display());

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .envs(&context.env)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RunnerError::Spawn {
                program: "sh".to_string(),
                reason: e.to_string(),
            })?;

        Ok(capture(output))
    }
}

/// Runs each command in a fresh container of the job's image
#[derive(Debug, Clone)]
pub struct ContainerRunner {
    /// Container runtime executable, e.g. `docker` or `podman`
    runtime: String,

    /// Host directory mounted at `/workspace`
    workdir: PathBuf,
}

impl ContainerRunner {
    pub fn new(runtime: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            runtime: runtime.into(),
            workdir: workdir.into(),
        }
    }

    /// Arguments passed to the runtime for one command
    pub fn args(&self, command: &str, context: &ExecutionContext) -> Result<Vec<String>, RunnerError> {
        let image = context.image.as_deref().ok_or(RunnerError::NoImage)?;

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/workspace", self.workdir.display()),
            "-w".to_string(),
            "/workspace".to_string(),
        ];
        for (key, value) in &context.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(image.to_string());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(command.to_string());

        Ok(args)
    }
}

#[async_trait]
impl CommandRunner for ContainerRunner {
    async fn run(&self, command: &str, context: &ExecutionContext) -> Result<CommandOutput, RunnerError> {
        let args = self.args(command, context)?;
        debug!("{} {}", self.runtime, args.join(" "));

        let output = Command::new(&self.runtime)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RunnerError::Spawn {
                program: self.runtime.clone(),
                reason: e.to_string(),
            })?;

        Ok(capture(output))
    }
}

fn capture(output: std::process::Output) -> CommandOutput {
    let exit_code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if exit_code != 0 {
        warn!("command exited with code {}: {}", exit_code, stderr.trim());
    }
    CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr,
    }
}
