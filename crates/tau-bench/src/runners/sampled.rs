//! Tier 2: benchmark an estimator across independently sampled DGPs.
//!
//! Phase A samples `num_dgp_samples` DGPs through a counting admission gate
//! so at most `min(n_workers, num_dgp_samples)` samplings are in flight; a
//! permit frees as soon as any one task finishes, not when a batch does. A
//! sampling task that fails stores nothing in its slot instead of tearing
//! down the phase; a recovery scan then resamples every empty slot
//! synchronously until it holds a DGP (or the configured retry budget runs
//! out). The phase never yields fewer than `num_dgp_samples` usable DGPs.
//!
//! Phase B runs the Tier-1 benchmark once per DGP on a second gated pool,
//! with Tier-1 parallelism forced to zero — parallelism is applied at the
//! DGP level, never nested. Results are consumed in completion order, which
//! is safe because Tier-2 aggregation is order-independent.
//!
//! Per-DGP aggregate means (not their per-run stds) re-aggregate into a
//! final mean ± std across DGPs: a second, independent deviation layer.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ConcreteDgpConfig, SampledDgpConfig};
use crate::contracts::{
    DataGeneratingProcess, DataMetricsFn, EstimatorFactory, SpecificationSampler,
};
use crate::error::{BenchError, BenchResult};
use crate::metrics::aggregate::{
    aggregate_metric_series, AggregatedMetrics, MetricSeries, RunSeriesByDgp,
};
use crate::metrics::performance::metric_set_for;
use crate::params::ParameterConfig;
use crate::runners::concrete::{acquire, ConcreteDgpResults, ConcreteDgpRunner};
use crate::util::{derive_seed, resolve_worker_count, task_rng};

/// Results of one Tier-2 benchmark.
#[derive(Debug)]
pub struct SampledDgpResults<D> {
    /// Performance metrics aggregated across DGPs (mean ± std).
    pub performance: AggregatedMetrics,
    /// Per-DGP aggregate means, one value per DGP, in completion order.
    pub performance_by_dgp: MetricSeries,
    /// Raw Tier-1 run values per metric, one inner vector per DGP.
    pub run_series_by_dgp: RunSeriesByDgp,
    /// Data metrics aggregated across DGPs. Std presence follows
    /// `data_metric_intervals`.
    pub data: AggregatedMetrics,
    /// Per-DGP data metric means, in completion order.
    pub data_by_dgp: MetricSeries,
    /// The sampled DGPs, in slot order.
    pub dgps: Vec<Arc<D>>,
}

/// Tier-2 benchmark runner over sampled DGPs.
pub struct SampledDgpRunner<S: SpecificationSampler> {
    estimand: String,
    config: SampledDgpConfig,
    data_metrics: Option<DataMetricsFn<<S::Dgp as DataGeneratingProcess>::Dataset>>,
}

impl<S: SpecificationSampler> SampledDgpRunner<S> {
    /// Create a runner targeting `estimand` with the default configuration.
    pub fn new(estimand: impl Into<String>) -> Self {
        Self {
            estimand: estimand.into(),
            config: SampledDgpConfig::default(),
            data_metrics: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SampledDgpConfig) -> Self {
        self.config = config;
        self
    }

    /// Supply the descriptive-statistics function for the data-analysis
    /// pathway.
    pub fn with_data_metrics(
        mut self,
        data_metrics: DataMetricsFn<<S::Dgp as DataGeneratingProcess>::Dataset>,
    ) -> Self {
        self.data_metrics = Some(data_metrics);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &SampledDgpConfig {
        &self.config
    }

    /// Sample `num_dgp_samples` DGPs and benchmark the estimator on each.
    pub async fn run<F>(
        &self,
        sampler: Arc<S>,
        params: &ParameterConfig,
        source: Arc<S::Source>,
        factory: Arc<F>,
    ) -> BenchResult<SampledDgpResults<S::Dgp>>
    where
        F: EstimatorFactory<<S::Dgp as DataGeneratingProcess>::Dataset>,
    {
        let metric_set = metric_set_for(&self.estimand)?;
        self.config.validate()?;
        let workers = resolve_worker_count(self.config.n_workers, self.config.num_dgp_samples)?;

        let dgps = self.sample_dgps(&sampler, params, &source, workers).await?;

        // Phase B: benchmark each DGP, parallelism at the DGP level only.
        let num_dgps = dgps.len();
        let mut performance_by_dgp = MetricSeries::new();
        let mut run_series_by_dgp = RunSeriesByDgp::new();
        let mut data_by_dgp = MetricSeries::new();
        let metric_names = metric_set.names();

        info!(
            num_dgps,
            workers, "benchmarking estimator against sampled DGPs"
        );
        if workers == 0 {
            for (index, dgp) in dgps.iter().enumerate() {
                let results = self.concrete_runner(index).run_sync(&**dgp, &*factory)?;
                debug!(dgp = index + 1, "collected DGP benchmark results");
                collect_dgp_results(
                    &metric_names,
                    results,
                    &mut performance_by_dgp,
                    &mut run_series_by_dgp,
                    &mut data_by_dgp,
                )?;
            }
        } else {
            let gate = Arc::new(Semaphore::new(workers));
            let mut tasks: JoinSet<(usize, BenchResult<ConcreteDgpResults>)> = JoinSet::new();
            for (index, dgp) in dgps.iter().enumerate() {
                let permit = acquire(&gate).await?;
                let runner = self.concrete_runner(index);
                let dgp = Arc::clone(dgp);
                let factory = Arc::clone(&factory);
                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    (index, runner.run_sync(&*dgp, &*factory))
                });
            }

            // Unordered consumption: fold each DGP's results in as soon as
            // they arrive.
            let mut done = 0usize;
            while let Some(joined) = tasks.join_next().await {
                let (index, result) = joined?;
                let results = result?;
                done += 1;
                debug!(
                    dgp = index + 1,
                    done, num_dgps, "collected DGP benchmark results"
                );
                collect_dgp_results(
                    &metric_names,
                    results,
                    &mut performance_by_dgp,
                    &mut run_series_by_dgp,
                    &mut data_by_dgp,
                )?;
            }
        }
        info!("done benchmarking sampled DGPs");

        let performance = aggregate_metric_series(&performance_by_dgp, true);
        let data = aggregate_metric_series(&data_by_dgp, self.config.data_metric_intervals);
        Ok(SampledDgpResults {
            performance,
            performance_by_dgp,
            run_series_by_dgp,
            data,
            data_by_dgp,
            dgps,
        })
    }

    /// Phase A: fill every sampling slot with a usable DGP.
    async fn sample_dgps(
        &self,
        sampler: &Arc<S>,
        params: &ParameterConfig,
        source: &Arc<S::Source>,
        workers: usize,
    ) -> BenchResult<Vec<Arc<S::Dgp>>> {
        let num_dgps = self.config.num_dgp_samples;
        let mut slots: Vec<Option<S::Dgp>> = (0..num_dgps).map(|_| None).collect();

        info!(num_dgps, workers, "sampling DGPs");
        if workers == 0 {
            for (index, slot) in slots.iter_mut().enumerate() {
                let mut rng = task_rng(self.config.seed, sampling_stream(num_dgps, index, 0));
                match sampler.sample_dgp(params, source, &mut rng) {
                    Ok(dgp) => *slot = Some(dgp),
                    Err(err) => {
                        warn!(dgp = index + 1, error = %err, "DGP sampling failed");
                    }
                }
            }
        } else {
            let gate = Arc::new(Semaphore::new(workers));
            let mut tasks: JoinSet<(usize, Option<S::Dgp>)> = JoinSet::new();
            for index in 0..num_dgps {
                // Admission gate: acquired before the sampling task starts,
                // released the moment it finishes.
                let permit = acquire(&gate).await?;
                let sampler = Arc::clone(sampler);
                let params = params.clone();
                let source = Arc::clone(source);
                let mut rng = task_rng(self.config.seed, sampling_stream(num_dgps, index, 0));
                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    debug!(dgp = index + 1, "sampling DGP");
                    match sampler.sample_dgp(&params, &source, &mut rng) {
                        Ok(dgp) => (index, Some(dgp)),
                        Err(err) => {
                            warn!(dgp = index + 1, error = %err, "DGP sampling failed");
                            (index, None)
                        }
                    }
                });
            }
            while let Some(joined) = tasks.join_next().await {
                let (index, dgp) = joined?;
                slots[index] = dgp;
            }
        }
        info!("done sampling DGPs");

        // Recovery pass: resample every empty slot synchronously until it
        // holds a DGP or the retry budget is exhausted.
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_some() {
                continue;
            }
            error!(
                dgp = index + 1,
                "recovering from failed DGP sampling by resampling"
            );
            *slot = Some(self.resample_slot(sampler, params, source, num_dgps, index)?);
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.map(Arc::new)
                    .ok_or_else(|| BenchError::Worker("sampling slot left empty".to_string()))
            })
            .collect()
    }

    fn resample_slot(
        &self,
        sampler: &Arc<S>,
        params: &ParameterConfig,
        source: &Arc<S::Source>,
        num_dgps: usize,
        index: usize,
    ) -> BenchResult<S::Dgp> {
        let mut recovery: u32 = 0;
        loop {
            recovery += 1;
            let mut rng = task_rng(
                self.config.seed,
                sampling_stream(num_dgps, index, recovery),
            );
            match sampler.sample_dgp(params, source, &mut rng) {
                Ok(dgp) => return Ok(dgp),
                Err(err) => {
                    warn!(
                        dgp = index + 1,
                        attempt = recovery,
                        error = %err,
                        "resampling failed"
                    );
                    if let Some(limit) = self.config.resample_limit {
                        if recovery >= limit.get() {
                            return Err(BenchError::SpecificationSampling {
                                index,
                                attempts: recovery + 1,
                                source: err,
                            });
                        }
                    }
                }
            }
        }
    }

    /// The Tier-1 runner for one sampled DGP. Internal parallelism is forced
    /// to zero; the seed derives from the Tier-2 seed and the slot index.
    fn concrete_runner(&self, index: usize) -> ConcreteDgpRunner<S::Dgp> {
        let config = ConcreteDgpConfig {
            num_sampling_runs: self.config.num_sampling_runs_per_dgp,
            num_samples_per_run: self.config.num_samples_from_dgp,
            data_analysis_mode: self.config.data_analysis_mode,
            n_workers: 0,
            seed: self
                .config
                .seed
                .map(|seed| derive_seed(seed, TIER1_SEED_SALT ^ index as u64)),
        };
        let mut runner = ConcreteDgpRunner::new(self.estimand.clone()).with_config(config);
        if let Some(data_metrics) = &self.data_metrics {
            runner = runner.with_data_metrics(Arc::clone(data_metrics));
        }
        runner
    }
}

const TIER1_SEED_SALT: u64 = 0x7a75_6265_6e63_68e1;

/// Stream id for one sampling attempt. Unique across slots and attempts.
fn sampling_stream(num_dgps: usize, index: usize, attempt: u32) -> u64 {
    attempt as u64 * num_dgps as u64 + index as u64
}

/// Fold one DGP's Tier-1 results into the Tier-2 series.
///
/// Only metric names declared for the active estimand may be referenced;
/// a missing entry is an error rather than a silent skip.
fn collect_dgp_results(
    metric_names: &[&'static str],
    results: ConcreteDgpResults,
    performance_by_dgp: &mut MetricSeries,
    run_series_by_dgp: &mut RunSeriesByDgp,
    data_by_dgp: &mut MetricSeries,
) -> BenchResult<()> {
    for name in metric_names {
        let aggregate = results
            .performance
            .get(*name)
            .ok_or_else(|| BenchError::UndeclaredMetric((*name).to_string()))?;
        performance_by_dgp
            .entry((*name).to_string())
            .or_default()
            .push(aggregate.mean);

        let run_values = results
            .performance_by_run
            .get(*name)
            .ok_or_else(|| BenchError::UndeclaredMetric((*name).to_string()))?;
        run_series_by_dgp
            .entry((*name).to_string())
            .or_default()
            .push(run_values.clone());
    }
    for (name, aggregate) in &results.data {
        data_by_dgp
            .entry(name.clone())
            .or_default()
            .push(aggregate.mean);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::DynError;
    use crate::estimands::ATE;
    use crate::synthetic::{
        FixedEstimatorFactory, StaticCovariateSource, SyntheticDgp, SyntheticDgpSampler,
    };
    use rand_chacha::ChaCha8Rng;

    /// Sampler whose first `failures` calls fail, after which it delegates.
    struct FlakySampler {
        inner: SyntheticDgpSampler,
        failures: AtomicUsize,
    }

    impl FlakySampler {
        fn failing_first(failures: usize) -> Self {
            Self {
                inner: SyntheticDgpSampler,
                failures: AtomicUsize::new(failures),
            }
        }
    }

    impl SpecificationSampler for FlakySampler {
        type Source = StaticCovariateSource;
        type Dgp = SyntheticDgp;

        fn sample_dgp(
            &self,
            params: &ParameterConfig,
            source: &Self::Source,
            rng: &mut ChaCha8Rng,
        ) -> Result<Self::Dgp, DynError> {
            let failed = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                    (left > 0).then(|| left - 1)
                })
                .is_ok();
            if failed {
                return Err("synthetic sampling failure".into());
            }
            self.inner.sample_dgp(params, source, rng)
        }
    }

    /// Sampler that never succeeds.
    struct BrokenSampler;

    impl SpecificationSampler for BrokenSampler {
        type Source = StaticCovariateSource;
        type Dgp = SyntheticDgp;

        fn sample_dgp(
            &self,
            _params: &ParameterConfig,
            _source: &Self::Source,
            _rng: &mut ChaCha8Rng,
        ) -> Result<Self::Dgp, DynError> {
            Err("persistent sampling failure".into())
        }
    }

    fn config(num_dgps: usize, workers: i64) -> SampledDgpConfig {
        SampledDgpConfig {
            num_dgp_samples: num_dgps,
            num_sampling_runs_per_dgp: 2,
            num_samples_from_dgp: 3,
            n_workers: workers,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn effect_params(effect: f64) -> ParameterConfig {
        ParameterConfig::new().with_parameter("true_effect", effect)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_constant_bias_across_dgps() {
        let runner = SampledDgpRunner::new(ATE).with_config(config(3, 2));
        let results = runner
            .run(
                Arc::new(SyntheticDgpSampler),
                &effect_params(2.0),
                Arc::new(StaticCovariateSource::new(20)),
                Arc::new(FixedEstimatorFactory::new(2.2)),
            )
            .await
            .unwrap();

        assert_eq!(results.dgps.len(), 3);
        assert!((results.performance["RMSE"].mean - 0.2).abs() < 1e-9);
        assert!((results.performance["AMBP"].mean - 10.0).abs() < 1e-9);
        // Identical DGPs: no spread across them.
        assert_eq!(results.performance["RMSE"].std, Some(0.0));
        assert_eq!(results.performance_by_dgp["RMSE"].len(), 3);
        assert_eq!(results.run_series_by_dgp["RMSE"].len(), 3);
        assert_eq!(results.run_series_by_dgp["RMSE"][0].len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_recovery_restores_every_slot() {
        // Two of four first attempts fail; retries must fill every slot.
        let runner = SampledDgpRunner::new(ATE).with_config(config(4, 2));
        let results = runner
            .run(
                Arc::new(FlakySampler::failing_first(2)),
                &effect_params(1.0),
                Arc::new(StaticCovariateSource::new(10)),
                Arc::new(FixedEstimatorFactory::new(1.0)),
            )
            .await
            .unwrap();

        assert_eq!(results.dgps.len(), 4);
        assert_eq!(results.performance_by_dgp["RMSE"].len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_retries_exhaust() {
        let mut cfg = config(2, 1);
        cfg.resample_limit = NonZeroU32::new(3);
        let runner = SampledDgpRunner::new(ATE).with_config(cfg);
        let result = runner
            .run(
                Arc::new(BrokenSampler),
                &effect_params(1.0),
                Arc::new(StaticCovariateSource::new(10)),
                Arc::new(FixedEstimatorFactory::new(1.0)),
            )
            .await;

        match result {
            Err(BenchError::SpecificationSampling {
                index, attempts, ..
            }) => {
                assert_eq!(index, 0);
                assert_eq!(attempts, 4);
            }
            other => panic!("expected SpecificationSampling, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_synchronous_mode_runs_both_phases() {
        let runner = SampledDgpRunner::new(ATE).with_config(config(3, 0));
        let results = runner
            .run(
                Arc::new(SyntheticDgpSampler),
                &effect_params(2.0),
                Arc::new(StaticCovariateSource::new(10)),
                Arc::new(FixedEstimatorFactory::new(2.0)),
            )
            .await
            .unwrap();
        assert_eq!(results.dgps.len(), 3);
        assert_eq!(results.performance["RMSE"].mean, 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_second_std_layer_over_heterogeneous_dgps() {
        // DGP-level effects spread around 2.0, estimator fixed at 2.0: each
        // DGP contributes a different RMSE, so the across-DGP std is
        // positive.
        let params = effect_params(2.0).with_parameter("effect_spread", 0.5);
        let runner = SampledDgpRunner::new(ATE).with_config(config(4, 2));
        let results = runner
            .run(
                Arc::new(SyntheticDgpSampler),
                &params,
                Arc::new(StaticCovariateSource::new(10)),
                Arc::new(FixedEstimatorFactory::new(2.0)),
            )
            .await
            .unwrap();

        let rmse = &results.performance["RMSE"];
        assert!(rmse.mean > 0.0);
        assert!(rmse.std.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_data_metric_intervals_toggle_std() {
        let describe: DataMetricsFn<crate::synthetic::SyntheticDataset> = Arc::new(|dataset| {
            BTreeMap::from([("treatment_share".to_string(), dataset.treatment_share())])
        });

        let mut cfg = config(2, 0);
        cfg.data_analysis_mode = true;
        cfg.data_metric_intervals = true;
        let runner = SampledDgpRunner::new(ATE)
            .with_config(cfg)
            .with_data_metrics(describe);
        let results = runner
            .run(
                Arc::new(SyntheticDgpSampler),
                &effect_params(1.0),
                Arc::new(StaticCovariateSource::new(20)),
                Arc::new(FixedEstimatorFactory::new(1.0)),
            )
            .await
            .unwrap();

        assert!(results.data["treatment_share"].std.is_some());
        assert_eq!(results.data_by_dgp["treatment_share"].len(), 2);
    }
}
