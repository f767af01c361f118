//! # tau-bench
//!
//! A benchmarking engine for causal-effect estimators. It measures, with
//! quantified uncertainty, how well an estimator recovers a known ground
//! truth by repeatedly sampling synthetic datasets from data-generating
//! processes (DGPs), fitting a fresh estimator to each, and scoring the
//! estimates against the truth.
//!
//! ## Aggregation Tiers
//!
//! | Tier | Runner | Repetition | Aggregation |
//! |------|--------|------------|-------------|
//! | 1 | [`ConcreteDgpRunner`] | samples within a run, runs per DGP | mean ± std across runs |
//! | 2 | [`SampledDgpRunner`] | DGPs sampled per parameter config | mean ± std across DGPs |
//! | 3 | [`GridSweepRunner`] | parameter-grid points | one row per point, no aggregation |
//!
//! Tier 1 fans sample evaluation out across a bounded worker pool; Tier 2
//! bounds concurrent DGP sampling with an admission gate, recovers from
//! sampling failures by resampling, and parallelizes across DGPs (never
//! nesting pools); Tier 3 is a pure map over the grid.
//!
//! ## Collaborators
//!
//! The engine consumes, and never implements, the domain seams: DGPs,
//! datasets, estimators, and specification samplers (see [`contracts`]).
//! Deterministic synthetic implementations live in [`synthetic`].
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tau_bench::config::SampledDgpConfig;
//! use tau_bench::estimands::ATE;
//! use tau_bench::params::ParameterConfig;
//! use tau_bench::runners::SampledDgpRunner;
//! use tau_bench::synthetic::{
//!     FixedEstimatorFactory, StaticCovariateSource, SyntheticDgpSampler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = SampledDgpRunner::new(ATE).with_config(SampledDgpConfig {
//!         num_dgp_samples: 4,
//!         num_sampling_runs_per_dgp: 2,
//!         num_samples_from_dgp: 8,
//!         n_workers: -1,
//!         seed: Some(42),
//!         ..Default::default()
//!     });
//!
//!     let results = runner
//!         .run(
//!             Arc::new(SyntheticDgpSampler),
//!             &ParameterConfig::new().with_parameter("true_effect", 2.0),
//!             Arc::new(StaticCovariateSource::new(100)),
//!             Arc::new(FixedEstimatorFactory::new(2.0)),
//!         )
//!         .await?;
//!
//!     assert_eq!(results.performance["RMSE"].mean, 0.0);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod contracts;
pub mod error;
pub mod estimands;
pub mod metrics;
pub mod params;
pub mod reports;
pub mod runners;
pub mod synthetic;
pub mod util;

// Re-export key types for convenience.
pub use config::{ConcreteDgpConfig, SampledDgpConfig};
pub use contracts::{
    DataGeneratingProcess, DataMetricsFn, Estimator, EstimatorFactory, GeneratedDataset,
    SpecificationSampler,
};
pub use error::{BenchError, BenchResult, DynError};
pub use estimands::{EffectValue, EstimandClass, EstimandSample};
pub use metrics::{aggregate_metric_series, AggregatedMetrics, MetricAggregate, MetricSeries};
pub use params::{ParamValue, ParameterConfig, ParameterGrid};
pub use reports::{ReportFormat, SweepReport};
pub use runners::{
    ConcreteDgpResults, ConcreteDgpRunner, GridSweepRunner, SampledDgpResults, SampledDgpRunner,
    SweepResults, SweepRow,
};
