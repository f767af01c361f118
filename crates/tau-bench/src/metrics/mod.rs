//! Metrics for scoring estimators and aggregating scores across tiers.
//!
//! - **Performance**: RMSE and AMBP for average-effect estimands, PEHE for
//!   individual-effect estimands, exposed through static lookup tables.
//! - **Aggregation**: the shared mean/std reduction applied at every tier.

pub mod aggregate;
pub mod performance;

pub use aggregate::{
    aggregate_metric_series, AggregatedMetrics, MetricAggregate, MetricSeries, RunSeriesByDgp,
};
pub use performance::{
    absolute_mean_bias_percentage, metric_set_for, precision_in_heterogeneous_effects,
    root_mean_squared_error, AverageMetricFn, IndividualMetricFn, MetricSet,
    AVERAGE_EFFECT_METRICS, INDIVIDUAL_EFFECT_METRICS,
};
