//! The aggregate gate - folds every prerequisite result into one pass/fail
//!
//! The gate is evaluated exactly once per invocation, after the scheduler has
//! driven every prerequisite to a terminal state. It is fail-closed: the only
//! way to pass is for every declared prerequisite to report `Success`.
//! Failures, skips, cancellations, missing results and unreadable input all
//! resolve to `Fail`.

pub mod source;

pub use source::{
    needs_json, parse_needs, resolve_required, EnvNeedsSource, FileSource, ResultSource,
    SourceError, NEEDS_ENV, REQUIRED_ENV,
};

use crate::core::{JobOutcome, JobResult};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The single bit reported to the merge gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOutcome {
    Pass,
    Fail,
}

impl AggregateOutcome {
    /// Process exit code: 0 for pass, 1 for fail
    pub fn exit_code(self) -> i32 {
        match self {
            AggregateOutcome::Pass => 0,
            AggregateOutcome::Fail => 1,
        }
    }

    pub fn is_pass(self) -> bool {
        self == AggregateOutcome::Pass
    }
}

impl fmt::Display for AggregateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateOutcome::Pass => f.write_str("pass"),
            AggregateOutcome::Fail => f.write_str("fail"),
        }
    }
}

/// Why a single prerequisite (or the input as a whole) blocked the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Failed { job: String, detail: Option<String> },
    Skipped { job: String },
    Cancelled { job: String },
    Missing { job: String },
    Unreadable { reason: String },
    NoPrerequisites,
}

impl Finding {
    fn is_failure(&self) -> bool {
        matches!(self, Finding::Failed { .. })
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Failed { job, detail: Some(detail) } => write!(f, "{} failed ({})", job, detail),
            Finding::Failed { job, detail: None } => write!(f, "{} failed", job),
            Finding::Skipped { job } => write!(f, "{} was skipped", job),
            Finding::Cancelled { job } => write!(f, "{} was cancelled", job),
            Finding::Missing { job } => write!(f, "{} reported no result", job),
            Finding::Unreadable { reason } => write!(f, "results unreadable: {}", reason),
            Finding::NoPrerequisites => f.write_str("no prerequisite jobs declared"),
        }
    }
}

/// Error taxonomy for a failed gate
///
/// Both kinds collapse into the same `Fail` decision; the split only shapes
/// the log line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("prerequisite failure: {}", join(.0))]
    PrerequisiteFailure(Vec<Finding>),

    #[error("prerequisite incomplete: {}", join(.0))]
    PrerequisiteIncomplete(Vec<Finding>),
}

fn join(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Terminal state of the gate: created once, never mutated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    outcome: AggregateOutcome,
    required: usize,
    findings: Vec<Finding>,
}

impl Decision {
    pub fn outcome(&self) -> AggregateOutcome {
        self.outcome
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Number of prerequisites the decision covered
    pub fn required(&self) -> usize {
        self.required
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    /// The error behind a `Fail` decision, `None` on `Pass`
    pub fn error(&self) -> Option<GateError> {
        if self.outcome.is_pass() {
            return None;
        }
        let (failures, incomplete): (Vec<_>, Vec<_>) =
            self.findings.iter().cloned().partition(Finding::is_failure);
        if failures.is_empty() {
            Some(GateError::PrerequisiteIncomplete(incomplete))
        } else {
            Some(GateError::PrerequisiteFailure(failures))
        }
    }

    /// Human-readable line naming the condition that decided the gate
    pub fn summary(&self) -> String {
        match self.error() {
            None => format!("all {} prerequisite job(s) succeeded", self.required),
            Some(err) => err.to_string(),
        }
    }

    fn fail(required: usize, findings: Vec<Finding>) -> Self {
        Self {
            outcome: AggregateOutcome::Fail,
            required,
            findings,
        }
    }
}

/// Folds the results of a fixed set of prerequisites into one decision
#[derive(Debug, Clone)]
pub struct Aggregator {
    name: String,
    required: Vec<String>,
}

impl Aggregator {
    pub fn new<I, S>(name: impl Into<String>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Evaluate the full set of results.
    ///
    /// Pure: the same inputs always yield the same decision. Results for jobs
    /// outside the required set are ignored; a job reported more than once
    /// passes only if every report is `Success`.
    pub fn evaluate(&self, results: &[JobResult]) -> Decision {
        if self.required.is_empty() {
            return Decision::fail(0, vec![Finding::NoPrerequisites]);
        }

        let mut by_job: HashMap<&str, Vec<&JobResult>> = HashMap::new();
        for result in results {
            by_job.entry(result.job.as_str()).or_default().push(result);
        }

        let mut findings = Vec::new();
        for job in &self.required {
            let reports = by_job.get(job.as_str()).map(Vec::as_slice).unwrap_or(&[]);

            if reports.is_empty() {
                findings.push(Finding::Missing { job: job.clone() });
                continue;
            }

            // Worst report wins: failure, then cancelled, then skipped
            let worst = reports
                .iter()
                .find(|r| r.outcome == JobOutcome::Failure)
                .or_else(|| reports.iter().find(|r| r.outcome == JobOutcome::Cancelled))
                .or_else(|| reports.iter().find(|r| r.outcome == JobOutcome::Skipped));

            match worst {
                None => {}
                Some(r) => findings.push(match r.outcome {
                    JobOutcome::Failure => Finding::Failed {
                        job: job.clone(),
                        detail: r.detail.clone(),
                    },
                    JobOutcome::Cancelled => Finding::Cancelled { job: job.clone() },
                    _ => Finding::Skipped { job: job.clone() },
                }),
            }
        }

        for result in results {
            if !self.required.contains(&result.job) {
                debug!("Ignoring result for undeclared job '{}'", result.job);
            }
        }

        if findings.is_empty() {
            Decision {
                outcome: AggregateOutcome::Pass,
                required: self.required.len(),
                findings,
            }
        } else {
            Decision::fail(self.required.len(), findings)
        }
    }

    /// Decision when the results could not be read at all
    pub fn unreadable(&self, reason: impl Into<String>) -> Decision {
        Decision::fail(
            self.required.len(),
            vec![Finding::Unreadable {
                reason: reason.into(),
            }],
        )
    }

    /// Emit the single decision log line
    pub fn log(&self, decision: &Decision) {
        match decision.outcome() {
            AggregateOutcome::Pass => info!("{}: pass - {}", self.name, decision.summary()),
            AggregateOutcome::Fail => warn!("{}: fail - {}", self.name, decision.summary()),
        }
    }
}
