//! Contracts for the collaborators the benchmark engine consumes.
//!
//! The engine never generates data, fits models, or reads covariates itself;
//! it only schedules those operations and aggregates their outputs. Each
//! seam is a trait:
//!
//! - [`DataGeneratingProcess`] — a sampled or concretely defined DGP that can
//!   draw datasets carrying a known ground truth.
//! - [`GeneratedDataset`] — one drawn dataset.
//! - [`Estimator`] / [`EstimatorFactory`] — the model under benchmark; a
//!   fresh instance is built per dataset.
//! - [`SpecificationSampler`] — produces DGP instances from a parameter
//!   configuration and a covariate source; the one collaborator whose
//!   failures the engine recovers from.
//!
//! Implementations must be deterministic given the RNG they are handed if
//! reproducible benchmarks are wanted.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;

use crate::error::DynError;
use crate::estimands::EffectValue;
use crate::params::ParameterConfig;

/// A data-generating process with a known ground-truth effect.
///
/// Instances are shared read-only across worker tasks, so implementations
/// must be `Send + Sync` and any mutable state (such as the data-analysis
/// flag) must use interior mutability.
///
/// `sample_dataset` runs beneath the engine's worker pool; implementations
/// must not spawn parallelism of their own, or the pool bound no longer
/// bounds anything.
pub trait DataGeneratingProcess: Send + Sync + 'static {
    /// The dataset type this DGP produces.
    type Dataset: GeneratedDataset;

    /// Number of observations in every dataset this DGP draws.
    fn n_observations(&self) -> usize;

    /// Toggle collection of the extra variables needed for data analysis.
    fn set_data_analysis_mode(&self, enabled: bool);

    /// Draw one dataset using the supplied task-local RNG.
    ///
    /// Failures here are fatal to the enclosing benchmark call.
    fn sample_dataset(&self, rng: &mut ChaCha8Rng) -> Result<Self::Dataset, DynError>;
}

/// A dataset drawn from a [`DataGeneratingProcess`].
pub trait GeneratedDataset: Send + 'static {
    /// Number of observations in the dataset.
    fn n_observations(&self) -> usize;

    /// The true effect for `estimand`, scalar or per-observation.
    fn ground_truth(&self, estimand: &str) -> Result<EffectValue, DynError>;
}

/// A causal estimator fitted to one dataset.
///
/// Estimators are built, fitted, and queried entirely within a single worker
/// task and are never shared.
pub trait Estimator {
    /// Fit the estimator to the dataset it was built from.
    fn fit(&mut self) -> Result<(), DynError>;

    /// The fitted estimate for `estimand`.
    fn estimate(&self, estimand: &str) -> Result<EffectValue, DynError>;
}

/// Builds a fresh [`Estimator`] per drawn dataset.
pub trait EstimatorFactory<D: GeneratedDataset>: Send + Sync + 'static {
    /// Construct an unfitted estimator for `dataset`.
    fn build(&self, dataset: &D) -> Result<Box<dyn Estimator>, DynError>;
}

/// Samples DGP instances from parameters and a covariate source.
///
/// Sampling may be expensive and may fail (the canonical case being
/// expression compilation inside the sampled DGP); the engine catches
/// failures and resamples the affected slot.
pub trait SpecificationSampler: Send + Sync + 'static {
    /// The covariate source threaded through to each sampling call. The
    /// engine never inspects it.
    type Source: Send + Sync + 'static;

    /// The DGP type produced.
    type Dgp: DataGeneratingProcess;

    /// Sample one DGP instance.
    fn sample_dgp(
        &self,
        params: &ParameterConfig,
        source: &Self::Source,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self::Dgp, DynError>;
}

/// Descriptive statistics computed on one drawn dataset, keyed by metric
/// name. Used for the optional data-analysis pathway.
pub type DataMetricsFn<D> = Arc<dyn Fn(&D) -> BTreeMap<String, f64> + Send + Sync>;
