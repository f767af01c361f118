//! Runner configuration.
//!
//! Worker counts use the shared convention: `-1` expands to all available
//! processing units, `0` forces synchronous execution, positive values cap
//! the pool, and any other negative value is rejected before work is
//! dispatched.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

fn at_least_one(field: &'static str, value: usize) -> BenchResult<()> {
    if value == 0 {
        return Err(BenchError::InvalidConfiguration {
            field,
            message: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Configuration for [`ConcreteDgpRunner`](crate::runners::ConcreteDgpRunner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcreteDgpConfig {
    /// Sequential sampling runs to perform against the DGP.
    pub num_sampling_runs: usize,
    /// Datasets drawn and evaluated per run.
    pub num_samples_per_run: usize,
    /// Whether to collect data metrics alongside performance metrics.
    pub data_analysis_mode: bool,
    /// Requested worker count for sample evaluation.
    pub n_workers: i64,
    /// Base seed for per-task RNG derivation; `None` seeds every task from
    /// OS entropy.
    pub seed: Option<u64>,
}

impl Default for ConcreteDgpConfig {
    fn default() -> Self {
        Self {
            num_sampling_runs: 1,
            num_samples_per_run: 8,
            data_analysis_mode: false,
            n_workers: 1,
            seed: None,
        }
    }
}

impl ConcreteDgpConfig {
    /// Validate field values. Fails fast, before any work is dispatched.
    pub fn validate(&self) -> BenchResult<()> {
        at_least_one("num_sampling_runs", self.num_sampling_runs)?;
        at_least_one("num_samples_per_run", self.num_samples_per_run)?;
        Ok(())
    }
}

/// Configuration for [`SampledDgpRunner`](crate::runners::SampledDgpRunner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledDgpConfig {
    /// Independent DGPs to sample and benchmark.
    pub num_dgp_samples: usize,
    /// Sampling runs per DGP (Tier-1 `num_sampling_runs`).
    pub num_sampling_runs_per_dgp: usize,
    /// Datasets per run (Tier-1 `num_samples_per_run`).
    pub num_samples_from_dgp: usize,
    /// Whether to collect data metrics alongside performance metrics.
    pub data_analysis_mode: bool,
    /// Whether data metrics also report a standard deviation across DGPs.
    pub data_metric_intervals: bool,
    /// Maximum recovery resampling attempts per failed sampling slot.
    /// `None` retries indefinitely.
    pub resample_limit: Option<NonZeroU32>,
    /// Requested worker count for DGP sampling and evaluation.
    pub n_workers: i64,
    /// Base seed for per-task RNG derivation; `None` seeds every task from
    /// OS entropy.
    pub seed: Option<u64>,
}

impl Default for SampledDgpConfig {
    fn default() -> Self {
        Self {
            num_dgp_samples: 8,
            num_sampling_runs_per_dgp: 1,
            num_samples_from_dgp: 8,
            data_analysis_mode: false,
            data_metric_intervals: false,
            resample_limit: None,
            n_workers: 1,
            seed: None,
        }
    }
}

impl SampledDgpConfig {
    /// Validate field values. Fails fast, before any work is dispatched.
    pub fn validate(&self) -> BenchResult<()> {
        at_least_one("num_dgp_samples", self.num_dgp_samples)?;
        at_least_one("num_sampling_runs_per_dgp", self.num_sampling_runs_per_dgp)?;
        at_least_one("num_samples_from_dgp", self.num_samples_from_dgp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        ConcreteDgpConfig::default().validate().unwrap();
        SampledDgpConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_counts_rejected() {
        let config = ConcreteDgpConfig {
            num_samples_per_run: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BenchError::InvalidConfiguration {
                field: "num_samples_per_run",
                ..
            })
        ));

        let config = SampledDgpConfig {
            num_dgp_samples: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
