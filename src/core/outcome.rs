//! Terminal job outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Terminal outcome of a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    /// Every command exited with status 0
    Success,
    /// A command exited non-zero, could not be spawned, or timed out
    Failure,
    /// The job was never run (e.g. filtered out upstream)
    Skipped,
    /// The job was terminated externally
    Cancelled,
}

impl JobOutcome {
    /// Map a process exit code to an outcome (0 is the only success)
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            JobOutcome::Success
        } else {
            JobOutcome::Failure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failure => "failure",
            JobOutcome::Skipped => "skipped",
            JobOutcome::Cancelled => "cancelled",
        }
    }

    /// Parse an orchestrator result string.
    ///
    /// Unknown strings resolve to `Failure`; an unrecognised status must never
    /// count as green.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(JobOutcome::Failure)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" | "succeeded" | "passed" => Ok(JobOutcome::Success),
            "failure" | "failed" => Ok(JobOutcome::Failure),
            "skipped" => Ok(JobOutcome::Skipped),
            "cancelled" | "canceled" => Ok(JobOutcome::Cancelled),
            other => Err(format!("Unknown job result: {}", other)),
        }
    }
}

/// Terminal result of one job in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Name of the job this result belongs to
    pub job: String,

    /// Terminal outcome
    pub outcome: JobOutcome,

    /// Short explanation for non-success outcomes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// When the job started (local executor only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached its terminal state (local executor only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobResult {
    /// Create a result with no detail or timing information
    pub fn new(job: impl Into<String>, outcome: JobOutcome) -> Self {
        Self {
            job: job.into(),
            outcome,
            detail: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_timing(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self.finished_at = Some(finished_at);
        self
    }

    pub fn success(job: impl Into<String>) -> Self {
        Self::new(job, JobOutcome::Success)
    }

    pub fn failure(job: impl Into<String>) -> Self {
        Self::new(job, JobOutcome::Failure)
    }

    pub fn skipped(job: impl Into<String>) -> Self {
        Self::new(job, JobOutcome::Skipped)
    }

    pub fn cancelled(job: impl Into<String>) -> Self {
        Self::new(job, JobOutcome::Cancelled)
    }
}
