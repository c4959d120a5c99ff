//! Pipeline domain model

use crate::core::{
    config::{ConfigError, PipelineConfig},
    job::JobSpec,
    outcome::JobResult,
    trigger::TriggerFilter,
};
use uuid::Uuid;

/// A fully expanded pipeline: parallel jobs plus the gate that joins them
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Unique id of this run
    pub run_id: Uuid,

    /// Expanded jobs in declaration order
    pub jobs: Vec<JobSpec>,

    /// Run-level trigger filter
    pub trigger: TriggerFilter,

    /// Name of the aggregate job
    pub gate_name: String,

    /// Names of the jobs the gate requires
    required: Vec<String>,

    /// Job templates the gate requires
    templates: Vec<String>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let jobs = config.expand_jobs()?;
        let templates = config.required_templates();

        let required = jobs
            .iter()
            .filter(|job| templates.contains(&job.template))
            .map(|job| job.name.clone())
            .collect();

        Ok(Pipeline {
            name: config.name.clone(),
            run_id: Uuid::new_v4(),
            jobs,
            trigger: TriggerFilter::from_config(&config.trigger)?,
            gate_name: config.gate.name.clone(),
            required,
            templates,
        })
    }

    /// Get a job by name
    pub fn job(&self, name: &str) -> Option<&JobSpec> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Jobs the gate requires, in declaration order
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Jobs the gate requires when deciding from results reported elsewhere.
    ///
    /// An orchestrator's needs context has one entry per template, while a
    /// local results file has one per matrix leg. A template reported under
    /// its own name is required as that name; otherwise each of its legs is.
    pub fn required_for(&self, results: &[JobResult]) -> Vec<String> {
        let mut required = Vec::new();
        for template in &self.templates {
            if results.iter().any(|r| &r.job == template) {
                required.push(template.clone());
                continue;
            }
            required.extend(
                self.jobs
                    .iter()
                    .filter(|job| &job.template == template)
                    .map(|job| job.name.clone()),
            );
        }
        required
    }
}
