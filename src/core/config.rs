//! Pipeline configuration from YAML

use crate::core::{
    job::JobSpec,
    matrix::MatrixConfig,
    pipeline::Pipeline,
    trigger::{TriggerConfig, TriggerFilter},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Default per-job timeout (one hour)
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Default display name of the aggregate job
pub const DEFAULT_GATE_NAME: &str = "ci result";

/// Errors raised while loading or validating a pipeline definition
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid pipeline: {0}")]
    Invalid(String),

    #[error("Invalid matrix: {0}")]
    Matrix(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Run-level trigger filter
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Job templates
    pub jobs: Vec<JobConfig>,

    /// Aggregate job configuration
    #[serde(default)]
    pub gate: GateConfig,

    /// Default timeout for jobs (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

/// Job template as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique template name
    pub name: String,

    /// Container image, may reference `{{ matrix.<axis> }}`
    #[serde(default)]
    pub image: Option<String>,

    /// Parameter matrix; absent means a single job
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,

    /// Extra environment for every command
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Commands, executed in order
    pub commands: Vec<String>,

    /// Timeout for each expanded job (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Aggregate ("ci result") job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Name reported to the merge gate
    #[serde(default = "default_gate_name")]
    pub name: String,

    /// Job templates the gate requires; empty means every template
    #[serde(default)]
    pub needs: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            name: default_gate_name(),
            needs: Vec::new(),
        }
    }
}

fn default_gate_name() -> String {
    DEFAULT_GATE_NAME.to_string()
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline name is empty".to_string()));
        }

        if self.jobs.is_empty() {
            return Err(ConfigError::Invalid("pipeline declares no jobs".to_string()));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(ConfigError::Invalid("job name is empty".to_string()));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(ConfigError::Invalid(format!("Duplicate job name: {}", job.name)));
            }
            if job.commands.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "Job '{}' has no commands",
                    job.name
                )));
            }
            if job.timeout_secs == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "Job '{}' has a zero timeout",
                    job.name
                )));
            }
        }

        for need in &self.gate.needs {
            if !seen.contains(need.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Gate '{}' needs non-existent job '{}'",
                    self.gate.name, need
                )));
            }
        }

        TriggerFilter::from_config(&self.trigger)?;

        // Expanded names must be unique too; this also validates every matrix
        let mut expanded = HashSet::new();
        for spec in self.expand_jobs()? {
            if !expanded.insert(spec.name.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "Matrix expansion produced duplicate job name: {}",
                    spec.name
                )));
            }
        }

        Ok(())
    }

    /// Expand every job template into its JobSpecs, in declaration order
    pub fn expand_jobs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        let default_timeout = self.default_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let mut specs = Vec::new();

        for job in &self.jobs {
            let combinations = match &job.matrix {
                Some(matrix) => matrix.expand()?,
                None => MatrixConfig::default().expand()?,
            };

            if combinations.is_empty() {
                return Err(ConfigError::Matrix(format!(
                    "job '{}' matrix excludes every combination",
                    job.name
                )));
            }

            for combination in &combinations {
                specs.push(JobSpec::expand(
                    &job.name,
                    job.image.as_deref(),
                    &job.env,
                    &job.commands,
                    job.timeout_secs.unwrap_or(default_timeout),
                    combination,
                ));
            }
        }

        Ok(specs)
    }

    /// Template names the gate requires
    pub fn required_templates(&self) -> Vec<String> {
        if self.gate.needs.is_empty() {
            self.jobs.iter().map(|j| j.name.clone()).collect()
        } else {
            self.gate.needs.clone()
        }
    }

    /// Convert to a runnable pipeline
    pub fn to_pipeline(&self) -> Result<Pipeline, ConfigError> {
        Pipeline::from_config(self)
    }
}
