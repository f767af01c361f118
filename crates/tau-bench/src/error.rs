//! Error types for tau-bench.
//!
//! This module defines the central error type [`BenchError`] used throughout
//! the crate, along with the [`BenchResult<T>`] type alias.
//!
//! Collaborator implementations (DGPs, estimators, samplers) report their own
//! failures as boxed errors; the benchmark core wraps those into structured
//! variants so callers can distinguish a misconfigured benchmark from a
//! collaborator blowing up mid-run.

use thiserror::Error;

/// Boxed error type used by collaborator trait implementations.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for benchmark operations.
pub type BenchResult<T> = Result<T, BenchError>;

/// Top-level error type for benchmark operations.
///
/// The validation variants (`UnknownEstimand`, `UnknownEstimandAggregation`,
/// `InvalidWorkerCount`, `InvalidConfiguration`) are raised before any work is
/// dispatched. `SpecificationSampling` is only surfaced once the configured
/// retry budget for a sampling slot is exhausted; transient sampling failures
/// are recovered internally and never reach the caller. Everything else is a
/// fatal mid-run failure that aborts the enclosing benchmark call.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The requested estimand is not in the declared estimand set.
    #[error("unknown estimand: {0:?}")]
    UnknownEstimand(String),

    /// The estimand is declared but classified as neither an average-effect
    /// nor an individual-effect estimand. This indicates an inconsistency in
    /// the estimand registry, not bad user input.
    #[error("estimand {0:?} is not classified as an average or individual effect")]
    UnknownEstimandAggregation(String),

    /// A negative worker count other than the `-1` "all processing units"
    /// sentinel was requested.
    #[error("invalid worker count {0}: expected -1 (all units), 0 (synchronous), or a positive count")]
    InvalidWorkerCount(i64),

    /// A configuration field failed validation.
    #[error("invalid configuration: {field} {message}")]
    InvalidConfiguration {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A metric name outside the active estimand's declared metric set was
    /// referenced during aggregation.
    #[error("metric {0:?} is not declared for the active estimand")]
    UndeclaredMetric(String),

    /// An estimate and its ground truth disagreed on shape, or an
    /// individual-effect vector did not match the DGP's observation count.
    #[error("estimand {estimand:?} shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The estimand being evaluated.
        estimand: String,
        /// Expected shape (e.g. `scalar` or `vector[n]`).
        expected: String,
        /// Shape actually produced.
        actual: String,
    },

    /// DGP sampling for one slot kept failing until its retry budget ran out.
    #[error("sampling the DGP for slot {index} failed after {attempts} attempts")]
    SpecificationSampling {
        /// Index of the sampling slot that could not be filled.
        index: usize,
        /// Total attempts made (initial attempt plus retries).
        attempts: u32,
        /// The last sampler error observed.
        #[source]
        source: DynError,
    },

    /// A DGP failed to generate a dataset mid-run.
    #[error("dataset generation failed")]
    DatasetGeneration(#[source] DynError),

    /// An estimator failed to build, fit, or produce an estimate.
    #[error("estimator failure")]
    Estimation(#[source] DynError),

    /// A dataset failed to report its ground-truth effect.
    #[error("ground truth lookup failed")]
    GroundTruth(#[source] DynError),

    /// A worker task panicked or was aborted before returning its result.
    #[error("benchmark worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for BenchError {
    fn from(err: tokio::task::JoinError) -> Self {
        BenchError::Worker(err.to_string())
    }
}
