//! Run-level trigger filter

use crate::core::config::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Env var the orchestrator uses to pass the triggering commit message
pub const COMMIT_MESSAGE_ENV: &str = "CI_COMMIT_MESSAGE";

/// Trigger configuration as written in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Markers that skip the whole run when found in the commit message
    #[serde(default)]
    pub skip_markers: Vec<String>,

    /// Treat markers as regular expressions
    #[serde(default)]
    pub use_regex: bool,
}

/// Pattern for matching a commit message (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum MarkerPattern {
    /// Simple substring match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl MarkerPattern {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            MarkerPattern::Simple(pattern) => text.contains(pattern.as_str()),
            MarkerPattern::Regex(regex) => regex.is_match(text),
        }
    }

    pub fn display(&self) -> &str {
        match self {
            MarkerPattern::Simple(pattern) => pattern,
            MarkerPattern::Regex(regex) => regex.as_str(),
        }
    }
}

/// Decides once per run whether the run is entered at all
#[derive(Debug, Clone, Default)]
pub struct TriggerFilter {
    markers: Vec<MarkerPattern>,
}

/// Result of evaluating the trigger filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// No marker matched; the run proceeds
    Run,
    /// A marker matched; no job executes
    Skip { marker: String },
}

impl TriggerFilter {
    pub fn from_config(config: &TriggerConfig) -> Result<Self, ConfigError> {
        let markers = config
            .skip_markers
            .iter()
            .map(|marker| {
                if config.use_regex {
                    Regex::new(marker)
                        .map(MarkerPattern::Regex)
                        .map_err(|e| ConfigError::InvalidPattern {
                            pattern: marker.clone(),
                            reason: e.to_string(),
                        })
                } else {
                    Ok(MarkerPattern::Simple(marker.clone()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { markers })
    }

    /// Evaluate against the triggering commit message; an absent message
    /// never matches
    pub fn evaluate(&self, commit_message: Option<&str>) -> TriggerDecision {
        let Some(message) = commit_message else {
            return TriggerDecision::Run;
        };

        self.markers
            .iter()
            .find(|marker| marker.matches(message))
            .map(|marker| TriggerDecision::Skip {
                marker: marker.display().to_string(),
            })
            .unwrap_or(TriggerDecision::Run)
    }
}
