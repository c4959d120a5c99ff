//! Reading prerequisite results from the hosting orchestrator

use crate::core::{JobOutcome, JobResult};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Env var carrying the needs context as JSON
pub const NEEDS_ENV: &str = "CI_GATE_NEEDS";

/// Env var listing the declared prerequisites, comma separated
pub const REQUIRED_ENV: &str = "CI_GATE_REQUIRED";

/// Errors raised while reading results
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed results JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed results: {0}")]
    Shape(String),
}

/// Where the gate reads its results from
pub trait ResultSource {
    /// Short description for log lines
    fn describe(&self) -> String;

    /// Load every reported result
    fn load(&self) -> Result<Vec<JobResult>, SourceError>;
}

/// Needs context injected through an environment variable
#[derive(Debug, Clone)]
pub struct EnvNeedsSource {
    var: String,
}

impl EnvNeedsSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvNeedsSource {
    fn default() -> Self {
        Self::new(NEEDS_ENV)
    }
}

impl ResultSource for EnvNeedsSource {
    fn describe(&self) -> String {
        format!("${}", self.var)
    }

    fn load(&self) -> Result<Vec<JobResult>, SourceError> {
        let raw = std::env::var(&self.var).map_err(|_| SourceError::MissingEnv(self.var.clone()))?;
        parse_needs(&raw)
    }
}

/// Needs-context JSON written to a file (e.g. by `ci-gate run --results-out`)
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<JobResult>, SourceError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.describe(),
            source,
        })?;
        parse_needs(&raw)
    }
}

/// Parse a needs context: `{ "<job>": { "result": "success", ... } }`.
///
/// A bare string value (`{ "<job>": "success" }`) is accepted too. Unknown
/// result strings become `Failure`.
pub fn parse_needs(raw: &str) -> Result<Vec<JobResult>, SourceError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(jobs) = value else {
        return Err(SourceError::Shape("expected a JSON object keyed by job name".to_string()));
    };

    jobs.into_iter()
        .map(|(job, entry)| {
            let result = match &entry {
                Value::String(s) => s.as_str(),
                Value::Object(fields) => fields
                    .get("result")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SourceError::Shape(format!("job '{}' has no result", job)))?,
                _ => {
                    return Err(SourceError::Shape(format!(
                        "job '{}' must map to an object or a string",
                        job
                    )))
                }
            };

            let outcome = JobOutcome::parse_lenient(result);
            debug!("Needs context: {} -> {}", job, outcome);

            let mut job_result = JobResult::new(job.clone(), outcome);
            if let Some(detail) = entry.get("detail").and_then(Value::as_str) {
                job_result = job_result.with_detail(detail);
            }
            Ok(job_result)
        })
        .collect()
}

/// Render results as a needs context
pub fn needs_json(results: &[JobResult]) -> Value {
    let mut map = Map::new();
    for result in results {
        let mut entry = Map::new();
        entry.insert("result".to_string(), Value::from(result.outcome.as_str()));
        if let Some(detail) = &result.detail {
            entry.insert("detail".to_string(), Value::from(detail.as_str()));
        }
        if let Some(started) = result.started_at {
            entry.insert("started_at".to_string(), Value::from(started.to_rfc3339()));
        }
        if let Some(finished) = result.finished_at {
            entry.insert("finished_at".to_string(), Value::from(finished.to_rfc3339()));
        }
        map.insert(result.job.clone(), Value::Object(entry));
    }
    Value::Object(map)
}

/// Decide the declared prerequisite set.
///
/// Precedence: an explicit list (from `CI_GATE_REQUIRED`), then the pipeline
/// definition, then the job names present in the results.
pub fn resolve_required(
    explicit: Option<&str>,
    pipeline: Option<&[String]>,
    results: &[JobResult],
) -> Vec<String> {
    if let Some(list) = explicit {
        return list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(required) = pipeline {
        return required.to_vec();
    }

    let mut names: Vec<String> = Vec::new();
    for result in results {
        if !names.contains(&result.job) {
            names.push(result.job.clone());
        }
    }
    names
}
