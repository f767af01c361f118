//! Performance metrics: how well an estimator recovers the true effect.
//!
//! Average-effect metrics operate on paired slices of per-dataset scalars;
//! individual-effect metrics operate on paired row-major vectors (one row per
//! dataset, one column per observation). Both kinds are defined over samples
//! of estimate values rather than a single estimate/truth pair.
//!
//! The metric sets are static, closed lookup tables. [`metric_set_for`]
//! resolves the table for an estimand and is the only way runners obtain
//! metric functions.

use crate::error::BenchResult;
use crate::estimands::{classify, EstimandClass};

/// Metric over per-dataset average-effect samples.
pub type AverageMetricFn = fn(&[f64], &[f64]) -> f64;

/// Metric over per-dataset individual-effect samples (row per dataset).
pub type IndividualMetricFn = fn(&[Vec<f64>], &[Vec<f64>]) -> f64;

/// Truths closer to zero than this are excluded from relative-bias metrics.
const ZERO_TRUTH_TOLERANCE: f64 = 1e-8;

/// Root Mean Squared Error:
/// `sqrt(mean((estimate_i - truth_i)^2))`.
///
/// Captures the combined bias and variance of the estimator. Paired with
/// AMBP to attribute a non-zero RMSE to one or the other.
pub fn root_mean_squared_error(estimates: &[f64], truths: &[f64]) -> f64 {
    let n = estimates.len();
    let sum_sq: f64 = estimates
        .iter()
        .zip(truths)
        .map(|(est, truth)| (est - truth).powi(2))
        .sum();
    (sum_sq / n as f64).sqrt()
}

/// Absolute Mean Bias Percentage:
/// `100 * |mean((estimate_i - truth_i) / truth_i)|`.
///
/// Pairs whose ground truth is within `1e-8` of zero are excluded; if every
/// pair is excluded the result is NaN.
pub fn absolute_mean_bias_percentage(estimates: &[f64], truths: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (est, truth) in estimates.iter().zip(truths) {
        if truth.abs() > ZERO_TRUTH_TOLERANCE {
            sum += (est - truth) / truth;
            count += 1;
        }
    }
    100.0 * (sum / count as f64).abs()
}

/// Precision in Estimation of Heterogeneous Effects (PEHE):
/// the per-dataset RMSE of the individual effects, averaged across datasets.
pub fn precision_in_heterogeneous_effects(
    estimates: &[Vec<f64>],
    truths: &[Vec<f64>],
) -> f64 {
    let per_dataset_rmse: f64 = estimates
        .iter()
        .zip(truths)
        .map(|(est_row, truth_row)| root_mean_squared_error(est_row, truth_row))
        .sum();
    per_dataset_rmse / estimates.len() as f64
}

/// Metric table for average-effect estimands.
pub static AVERAGE_EFFECT_METRICS: &[(&str, AverageMetricFn)] = &[
    ("RMSE", root_mean_squared_error),
    ("AMBP", absolute_mean_bias_percentage),
];

/// Metric table for individual-effect estimands.
pub static INDIVIDUAL_EFFECT_METRICS: &[(&str, IndividualMetricFn)] =
    &[("PEHE", precision_in_heterogeneous_effects)];

/// The metric table applying to one estimand class.
#[derive(Debug, Clone, Copy)]
pub enum MetricSet {
    /// Metrics over scalar estimate/truth samples.
    Average(&'static [(&'static str, AverageMetricFn)]),
    /// Metrics over vector estimate/truth samples.
    Individual(&'static [(&'static str, IndividualMetricFn)]),
}

impl MetricSet {
    /// Names of the metrics in this set, in table order.
    pub fn names(&self) -> Vec<&'static str> {
        match self {
            MetricSet::Average(table) => table.iter().map(|(name, _)| *name).collect(),
            MetricSet::Individual(table) => table.iter().map(|(name, _)| *name).collect(),
        }
    }

    /// The estimand class this set applies to.
    pub fn class(&self) -> EstimandClass {
        match self {
            MetricSet::Average(_) => EstimandClass::Average,
            MetricSet::Individual(_) => EstimandClass::Individual,
        }
    }
}

/// Resolve the metric table for an estimand.
///
/// # Errors
/// * [`BenchError::UnknownEstimand`] for an undeclared estimand.
/// * [`BenchError::UnknownEstimandAggregation`] for a declared but
///   unclassified estimand.
pub fn metric_set_for(estimand: &str) -> BenchResult<MetricSet> {
    match classify(estimand)? {
        EstimandClass::Average => Ok(MetricSet::Average(AVERAGE_EFFECT_METRICS)),
        EstimandClass::Individual => Ok(MetricSet::Individual(INDIVIDUAL_EFFECT_METRICS)),
    }
}
