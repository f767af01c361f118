//! Metric series aggregation.
//!
//! Every tier reduces its child results the same way: a [`MetricSeries`]
//! (metric name -> observed values) collapses into [`AggregatedMetrics`]
//! (metric name -> mean, optionally std). The reduction is pure and
//! sequential; all concurrency lives in the runners.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Decimal places kept when reporting aggregated metric values.
const METRIC_ROUNDING: i32 = 3;

/// Ordered mapping from metric name to its observed values.
///
/// Value order is the completion order of the producing work items; key
/// iteration order is lexicographic.
pub type MetricSeries = BTreeMap<String, Vec<f64>>;

/// Raw per-run series per metric, one inner vector per sampled DGP.
pub type RunSeriesByDgp = BTreeMap<String, Vec<Vec<f64>>>;

/// Mean and optional standard deviation of one metric's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    /// Arithmetic mean of the series.
    pub mean: f64,
    /// Population standard deviation of the series, when requested.
    /// A single-element series has a standard deviation of exactly 0.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
}

/// Mapping from metric name to its aggregate.
pub type AggregatedMetrics = BTreeMap<String, MetricAggregate>;

/// Round a metric value for reporting.
pub(crate) fn round_metric(value: f64) -> f64 {
    let factor = 10f64.powi(METRIC_ROUNDING);
    (value * factor).round() / factor
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Aggregate each metric's series into a mean (and std when `with_std`),
/// rounded to [`METRIC_ROUNDING`] decimal places.
///
/// An empty series aggregates to NaN.
pub fn aggregate_metric_series(series: &MetricSeries, with_std: bool) -> AggregatedMetrics {
    series
        .iter()
        .map(|(name, values)| {
            let aggregate = MetricAggregate {
                mean: round_metric(mean(values)),
                std: with_std.then(|| round_metric(population_std(values))),
            };
            (name.clone(), aggregate)
        })
        .collect()
}
