//! Parameter configurations and sweep grids.
//!
//! A [`ParameterConfig`] is the named-value store handed to the
//! specification sampler; how its values shape the sampled DGP is entirely
//! the sampler's business. A [`ParameterGrid`] maps axis names to candidate
//! levels and expands into the Cartesian product of assignments for Tier 3.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A real-valued parameter.
    Number(f64),
    /// A named level, e.g. `"LOW"`.
    Text(String),
    /// A boolean switch.
    Flag(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
            ParamValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Flag(v)
    }
}

/// One assignment of a value to every axis of a grid point.
pub type ParameterAssignment = BTreeMap<String, ParamValue>;

/// Named parameter values consumed by a specification sampler.
///
/// Each call site constructs its own instance; configs are never shared
/// mutable defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, overwriting any existing value.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`set_parameter`](Self::set_parameter).
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Look up a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Look up a numeric parameter, falling back to `default` when absent or
    /// non-numeric.
    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        match self.values.get(name) {
            Some(ParamValue::Number(v)) => *v,
            _ => default,
        }
    }

    /// Iterate over the stored parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    /// Number of stored parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameters are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A grid of candidate levels per parameter axis.
///
/// Axes iterate in lexicographic name order; [`expand`](Self::expand) walks
/// the Cartesian product with the last axis varying fastest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterGrid {
    axes: BTreeMap<String, Vec<ParamValue>>,
}

impl ParameterGrid {
    /// Create an empty grid. An empty grid expands to a single empty
    /// assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis with its candidate levels.
    pub fn axis<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        levels: impl IntoIterator<Item = V>,
    ) -> Self {
        self.axes
            .insert(name.into(), levels.into_iter().map(Into::into).collect());
        self
    }

    /// Number of grid points in the full expansion.
    pub fn point_count(&self) -> usize {
        self.axes.values().map(Vec::len).product()
    }

    /// Expand into the Cartesian product of axis levels.
    ///
    /// Any axis with zero levels makes the product empty.
    pub fn expand(&self) -> Vec<ParameterAssignment> {
        let axes: Vec<(&String, &Vec<ParamValue>)> = self.axes.iter().collect();
        if axes.iter().any(|(_, levels)| levels.is_empty()) {
            return Vec::new();
        }

        let mut assignments = Vec::with_capacity(self.point_count());
        let mut indices = vec![0usize; axes.len()];
        loop {
            let assignment: ParameterAssignment = axes
                .iter()
                .zip(&indices)
                .map(|((name, levels), &i)| ((*name).clone(), levels[i].clone()))
                .collect();
            assignments.push(assignment);

            // Odometer increment, last axis fastest.
            let mut axis = axes.len();
            loop {
                if axis == 0 {
                    return assignments;
                }
                axis -= 1;
                indices[axis] += 1;
                if indices[axis] < axes[axis].1.len() {
                    break;
                }
                indices[axis] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_parameter_overwrites() {
        let mut config = ParameterConfig::new();
        config.set_parameter("true_effect", 1.0);
        config.set_parameter("true_effect", 2.0);
        assert_eq!(config.get("true_effect"), Some(&ParamValue::Number(2.0)));
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_number_or_fallback() {
        let config = ParameterConfig::new().with_parameter("level", "LOW");
        assert_eq!(config.number_or("level", 9.0), 9.0);
        assert_eq!(config.number_or("missing", 3.5), 3.5);
    }

    #[test]
    fn test_grid_expansion_size_and_order() {
        let grid = ParameterGrid::new()
            .axis("alignment", ["LOW", "HIGH"])
            .axis("balance", [0.2, 0.8]);
        let points = grid.expand();
        assert_eq!(points.len(), 4);
        assert_eq!(grid.point_count(), 4);

        // Axes in name order, last axis fastest.
        assert_eq!(points[0]["alignment"], ParamValue::Text("LOW".into()));
        assert_eq!(points[0]["balance"], ParamValue::Number(0.2));
        assert_eq!(points[1]["alignment"], ParamValue::Text("LOW".into()));
        assert_eq!(points[1]["balance"], ParamValue::Number(0.8));
        assert_eq!(points[3]["alignment"], ParamValue::Text("HIGH".into()));
    }

    #[test]
    fn test_empty_grid_is_single_empty_assignment() {
        let points = ParameterGrid::new().expand();
        assert_eq!(points.len(), 1);
        assert!(points[0].is_empty());
    }

    #[test]
    fn test_axis_with_no_levels_empties_product() {
        let grid = ParameterGrid::new()
            .axis("alignment", ["LOW"])
            .axis("balance", Vec::<f64>::new());
        assert!(grid.expand().is_empty());
    }
}
