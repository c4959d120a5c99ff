//! Job domain model

use crate::core::matrix::Combination;
use serde::Serialize;
use std::collections::BTreeMap;

/// Isolated environment a job runs in
///
/// The image is opaque to the gate; only the container runner reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionContext {
    /// Container image reference
    pub image: Option<String>,

    /// Extra environment variables for every command
    pub env: BTreeMap<String, String>,
}

/// A statically declared unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    /// Unique job name, e.g. `test (rust:latest, async)`
    pub name: String,

    /// Name of the template this job was expanded from
    pub template: String,

    /// Where the commands run
    pub context: ExecutionContext,

    /// Commands, executed in order
    pub commands: Vec<String>,

    /// Per-job timeout in seconds
    pub timeout_secs: u64,

    /// Matrix combination this job was expanded from
    #[serde(skip_serializing_if = "Combination::is_empty")]
    pub combination: Combination,
}

impl JobSpec {
    /// Expand a job template for one matrix combination
    pub fn expand(
        template: &str,
        image: Option<&str>,
        env: &BTreeMap<String, String>,
        commands: &[String],
        timeout_secs: u64,
        combination: &Combination,
    ) -> Self {
        let name = if combination.is_empty() {
            template.to_string()
        } else {
            format!("{} ({})", template, combination.label())
        };

        JobSpec {
            name,
            template: template.to_string(),
            context: ExecutionContext {
                image: image.map(|i| render(i, combination)),
                env: env
                    .iter()
                    .map(|(k, v)| (k.clone(), render(v, combination)))
                    .collect(),
            },
            commands: commands.iter().map(|c| render(c, combination)).collect(),
            timeout_secs,
            combination: combination.clone(),
        }
    }
}

/// Substitute `{{ matrix.<axis> }}` placeholders; unknown ones are left alone
pub fn render(template: &str, combination: &Combination) -> String {
    let mut rendered = template.to_string();

    for (axis, value) in combination.iter() {
        for placeholder in [
            format!("{{{{ matrix.{} }}}}", axis),
            format!("{{{{matrix.{}}}}}", axis),
        ] {
            rendered = rendered.replace(&placeholder, value);
        }
    }

    rendered
}
