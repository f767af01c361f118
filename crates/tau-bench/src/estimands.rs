//! Estimand registry and estimand sample types.
//!
//! The set of estimands a benchmark can target is static and closed: every
//! estimand name must appear in [`ALL_ESTIMANDS`] and in exactly one of the
//! classification slices ([`AVERAGE_ESTIMANDS`] or [`INDIVIDUAL_ESTIMANDS`]).
//! Classification determines the shape of estimate/ground-truth values and
//! which metric table applies.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Average treatment effect over the full population.
pub const ATE: &str = "ATE";
/// Average treatment effect over the treated subpopulation.
pub const ATT: &str = "ATT";
/// Individual (per-observation) treatment effect.
pub const ITE: &str = "ITE";

/// Every estimand the engine knows about.
pub static ALL_ESTIMANDS: &[&str] = &[ATE, ATT, ITE];

/// Estimands whose estimate/truth are a single real value per dataset.
pub static AVERAGE_ESTIMANDS: &[&str] = &[ATE, ATT];

/// Estimands whose estimate/truth are one real value per observation.
pub static INDIVIDUAL_ESTIMANDS: &[&str] = &[ITE];

/// Shape classification of an estimand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimandClass {
    /// One scalar estimate/truth pair per dataset.
    Average,
    /// One equal-length estimate/truth vector pair per dataset.
    Individual,
}

/// Classify an estimand name against the static registry.
///
/// # Errors
/// * [`BenchError::UnknownEstimand`] if the name is not declared at all.
/// * [`BenchError::UnknownEstimandAggregation`] if the name is declared but
///   appears in neither classification slice. The registry above cannot
///   express this state, but the check guards against it drifting out of
///   sync as estimands are added.
pub fn classify(estimand: &str) -> BenchResult<EstimandClass> {
    if !ALL_ESTIMANDS.contains(&estimand) {
        return Err(BenchError::UnknownEstimand(estimand.to_string()));
    }
    if INDIVIDUAL_ESTIMANDS.contains(&estimand) {
        Ok(EstimandClass::Individual)
    } else if AVERAGE_ESTIMANDS.contains(&estimand) {
        Ok(EstimandClass::Average)
    } else {
        Err(BenchError::UnknownEstimandAggregation(estimand.to_string()))
    }
}

/// An effect value produced by an estimator or read from a dataset's ground
/// truth. Scalar for average-effect estimands, one entry per observation for
/// individual-effect estimands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectValue {
    /// A single average effect.
    Scalar(f64),
    /// Per-observation individual effects.
    Individual(Vec<f64>),
}

impl EffectValue {
    /// Human-readable shape description, used in shape-mismatch errors.
    pub fn shape(&self) -> String {
        match self {
            EffectValue::Scalar(_) => "scalar".to_string(),
            EffectValue::Individual(v) => format!("vector[{}]", v.len()),
        }
    }

    /// The scalar value, if this is an average effect.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            EffectValue::Scalar(v) => Some(*v),
            EffectValue::Individual(_) => None,
        }
    }

    /// The per-observation values, if this is an individual effect.
    pub fn as_individual(&self) -> Option<&[f64]> {
        match self {
            EffectValue::Scalar(_) => None,
            EffectValue::Individual(v) => Some(v),
        }
    }

    fn matches_class(&self, class: EstimandClass, n_observations: usize) -> bool {
        match (self, class) {
            (EffectValue::Scalar(_), EstimandClass::Average) => true,
            (EffectValue::Individual(v), EstimandClass::Individual) => v.len() == n_observations,
            _ => false,
        }
    }
}

/// The estimate/ground-truth pair for one drawn dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimandSample {
    /// The estimator's output for the target estimand.
    pub estimate: EffectValue,
    /// The dataset's known true effect for the same estimand.
    pub ground_truth: EffectValue,
}

impl EstimandSample {
    /// Build a sample, enforcing the shape invariant: estimate and ground
    /// truth must both match the estimand class, and individual-effect
    /// vectors must have exactly `n_observations` entries.
    pub fn new(
        estimand: &str,
        class: EstimandClass,
        n_observations: usize,
        estimate: EffectValue,
        ground_truth: EffectValue,
    ) -> BenchResult<Self> {
        let expected = match class {
            EstimandClass::Average => "scalar".to_string(),
            EstimandClass::Individual => format!("vector[{n_observations}]"),
        };
        for value in [&estimate, &ground_truth] {
            if !value.matches_class(class, n_observations) {
                return Err(BenchError::ShapeMismatch {
                    estimand: estimand.to_string(),
                    expected,
                    actual: value.shape(),
                });
            }
        }
        Ok(Self {
            estimate,
            ground_truth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_estimands() {
        assert_eq!(classify(ATE).unwrap(), EstimandClass::Average);
        assert_eq!(classify(ATT).unwrap(), EstimandClass::Average);
        assert_eq!(classify(ITE).unwrap(), EstimandClass::Individual);
    }

    #[test]
    fn test_classify_unknown_estimand() {
        match classify("APE") {
            Err(BenchError::UnknownEstimand(name)) => assert_eq!(name, "APE"),
            other => panic!("expected UnknownEstimand, got {other:?}"),
        }
    }

    #[test]
    fn test_sample_accepts_matching_shapes() {
        let sample = EstimandSample::new(
            ATE,
            EstimandClass::Average,
            50,
            EffectValue::Scalar(2.0),
            EffectValue::Scalar(1.9),
        );
        assert!(sample.is_ok());

        let sample = EstimandSample::new(
            ITE,
            EstimandClass::Individual,
            3,
            EffectValue::Individual(vec![1.0, 2.0, 3.0]),
            EffectValue::Individual(vec![1.1, 2.1, 2.9]),
        );
        assert!(sample.is_ok());
    }

    #[test]
    fn test_sample_rejects_shape_mismatch() {
        // Scalar where a vector is required.
        let result = EstimandSample::new(
            ITE,
            EstimandClass::Individual,
            3,
            EffectValue::Scalar(1.0),
            EffectValue::Individual(vec![1.0, 2.0, 3.0]),
        );
        assert!(matches!(result, Err(BenchError::ShapeMismatch { .. })));

        // Vector of the wrong length.
        let result = EstimandSample::new(
            ITE,
            EstimandClass::Individual,
            3,
            EffectValue::Individual(vec![1.0, 2.0]),
            EffectValue::Individual(vec![1.0, 2.0, 3.0]),
        );
        assert!(matches!(result, Err(BenchError::ShapeMismatch { .. })));
    }
}
