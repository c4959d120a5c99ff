//! Matrix expansion - one JobSpec per parameter combination

use crate::core::config::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Largest flag list accepted for a power-set axis (2^16 combinations)
pub const MAX_POWERSET_FLAGS: usize = 16;

/// Largest number of combinations one matrix may expand to, before exclusions
pub const MAX_COMBINATIONS: usize = 1 << 16;

/// Matrix declaration as written in YAML
///
/// Every key other than `exclude` is an axis. An axis is either a list of
/// scalar values or `{ powerset: [flag, ...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Combinations to drop; each entry matches when all of its keys match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<BTreeMap<String, Value>>,

    /// Axes in declaration order
    #[serde(flatten)]
    pub axes: Mapping,
}

/// A resolved matrix axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

/// One point in the matrix cross-product, axis order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Combination {
    values: Vec<(String, String)>,
}

impl Combination {
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Display label used in expanded job names, e.g. `rust:latest, async,blocking`
    pub fn label(&self) -> String {
        self.values
            .iter()
            .map(|(axis, value)| {
                if value.is_empty() {
                    format!("no-{}", axis)
                } else {
                    value.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn push(&self, axis: &str, value: &str) -> Self {
        let mut values = self.values.clone();
        values.push((axis.to_string(), value.to_string()));
        Self { values }
    }
}

impl MatrixConfig {
    /// Resolve the declared axes, expanding power-set axes
    pub fn resolve_axes(&self) -> Result<Vec<Axis>, ConfigError> {
        let mut axes = Vec::with_capacity(self.axes.len());

        for (key, value) in &self.axes {
            let name = scalar_to_string(key)
                .ok_or_else(|| ConfigError::Matrix("axis names must be scalars".to_string()))?;

            let values = match value {
                Value::Sequence(items) => items
                    .iter()
                    .map(|item| {
                        scalar_to_string(item).ok_or_else(|| {
                            ConfigError::Matrix(format!("axis '{}' has a non-scalar value", name))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Value::Mapping(map) => {
                    let flags = match map.get("powerset") {
                        Some(Value::Sequence(flags)) => flags
                            .iter()
                            .map(|f| {
                                scalar_to_string(f).ok_or_else(|| {
                                    ConfigError::Matrix(format!(
                                        "axis '{}' has a non-scalar flag",
                                        name
                                    ))
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                        _ => {
                            return Err(ConfigError::Matrix(format!(
                                "axis '{}' must be a list or {{ powerset: [...] }}",
                                name
                            )))
                        }
                    };
                    powerset(&name, &flags)?
                }
                _ => {
                    return Err(ConfigError::Matrix(format!(
                        "axis '{}' must be a list or {{ powerset: [...] }}",
                        name
                    )))
                }
            };

            if values.is_empty() {
                return Err(ConfigError::Matrix(format!("axis '{}' has no values", name)));
            }

            axes.push(Axis { name, values });
        }

        Ok(axes)
    }

    /// Expand the matrix into its combinations, minus exclusions
    ///
    /// An empty matrix yields a single empty combination.
    pub fn expand(&self) -> Result<Vec<Combination>, ConfigError> {
        let axes = self.resolve_axes()?;

        let mut combinations = vec![Combination::default()];
        for axis in &axes {
            let total = combinations.len().saturating_mul(axis.values.len());
            if total > MAX_COMBINATIONS {
                return Err(ConfigError::Matrix(format!(
                    "matrix expands to more than {} combinations at axis '{}'",
                    MAX_COMBINATIONS, axis.name
                )));
            }
            combinations = combinations
                .iter()
                .flat_map(|combo| axis.values.iter().map(move |v| combo.push(&axis.name, v)))
                .collect();
        }

        let excluded = |combo: &Combination| {
            self.exclude.iter().any(|rule| {
                !rule.is_empty()
                    && rule.iter().all(|(axis, value)| {
                        scalar_to_string(value).as_deref() == combo.get(axis)
                    })
            })
        };

        Ok(combinations.into_iter().filter(|c| !excluded(c)).collect())
    }
}

/// Every subset of `flags`, smallest first, each joined with commas in
/// declaration order
pub fn powerset(axis: &str, flags: &[String]) -> Result<Vec<String>, ConfigError> {
    if flags.len() > MAX_POWERSET_FLAGS {
        return Err(ConfigError::Matrix(format!(
            "axis '{}' lists {} flags; at most {} are allowed in a powerset",
            axis,
            flags.len(),
            MAX_POWERSET_FLAGS
        )));
    }

    let mut masks: Vec<u32> = (0..(1u32 << flags.len())).collect();
    masks.sort_by_key(|mask| mask.count_ones());

    Ok(masks
        .into_iter()
        .map(|mask| {
            flags
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, flag)| flag.as_str())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
