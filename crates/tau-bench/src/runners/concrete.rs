//! Tier 1: benchmark an estimator against one concrete DGP.
//!
//! A benchmark consists of `num_sampling_runs` sequential runs, each drawing
//! `num_samples_per_run` datasets in parallel, fitting a fresh estimator to
//! every dataset, and scoring the run's estimate/truth samples with each
//! declared metric function. Run-level values then aggregate into a mean and
//! standard deviation per metric.
//!
//! Parallelism is a semaphore-guarded `spawn_blocking` spawner: a permit is
//! acquired before each evaluation task starts and released when it
//! finishes, so at most `min(n_workers, num_samples_per_run)` evaluations are
//! in flight. Results land in slots indexed by sample index, making the
//! run-level reduction independent of completion order.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::ConcreteDgpConfig;
use crate::contracts::{DataGeneratingProcess, DataMetricsFn, EstimatorFactory, GeneratedDataset};
use crate::error::{BenchError, BenchResult};
use crate::estimands::{EstimandClass, EstimandSample};
use crate::metrics::aggregate::{aggregate_metric_series, mean, AggregatedMetrics, MetricSeries};
use crate::metrics::performance::{metric_set_for, MetricSet};
use crate::util::{resolve_worker_count, task_rng};

/// Results of one Tier-1 benchmark.
#[derive(Debug, Clone)]
pub struct ConcreteDgpResults {
    /// Performance metrics aggregated across runs (mean ± std).
    pub performance: AggregatedMetrics,
    /// Raw run-level performance metric values, in run order.
    pub performance_by_run: MetricSeries,
    /// Data metrics aggregated across runs (mean only). Empty unless
    /// data-analysis mode was enabled.
    pub data: AggregatedMetrics,
    /// Raw run-level data metric values, in run order.
    pub data_by_run: MetricSeries,
}

/// Evaluate one sample: draw a dataset, fit a fresh estimator, and pair the
/// estimate with the dataset's ground truth.
///
/// This is the stateless worker unit dispatched across the Tier-1 pool. The
/// drawn dataset is returned alongside the sample so the data-analysis
/// pathway can describe it.
pub fn evaluate_sample<D, F>(
    dgp: &D,
    factory: &F,
    estimand: &str,
    class: EstimandClass,
    index: usize,
    rng: &mut ChaCha8Rng,
) -> BenchResult<(usize, EstimandSample, D::Dataset)>
where
    D: DataGeneratingProcess,
    F: EstimatorFactory<D::Dataset>,
{
    debug!(sample = index + 1, "generating dataset");
    let dataset = dgp.sample_dataset(rng).map_err(BenchError::DatasetGeneration)?;

    debug!(sample = index + 1, "fitting estimator");
    let mut estimator = factory.build(&dataset).map_err(BenchError::Estimation)?;
    estimator.fit().map_err(BenchError::Estimation)?;

    let estimate = estimator.estimate(estimand).map_err(BenchError::Estimation)?;
    let ground_truth = dataset.ground_truth(estimand).map_err(BenchError::GroundTruth)?;

    let sample = EstimandSample::new(estimand, class, dgp.n_observations(), estimate, ground_truth)?;
    Ok((index, sample, dataset))
}

/// Tier-1 benchmark runner for a concrete DGP instance.
pub struct ConcreteDgpRunner<D: DataGeneratingProcess> {
    estimand: String,
    config: ConcreteDgpConfig,
    data_metrics: Option<DataMetricsFn<D::Dataset>>,
}

impl<D: DataGeneratingProcess> ConcreteDgpRunner<D> {
    /// Create a runner targeting `estimand` with the default configuration.
    pub fn new(estimand: impl Into<String>) -> Self {
        Self {
            estimand: estimand.into(),
            config: ConcreteDgpConfig::default(),
            data_metrics: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ConcreteDgpConfig) -> Self {
        self.config = config;
        self
    }

    /// Supply the descriptive-statistics function for the data-analysis
    /// pathway. Only consulted when `data_analysis_mode` is enabled.
    pub fn with_data_metrics(mut self, data_metrics: DataMetricsFn<D::Dataset>) -> Self {
        self.data_metrics = Some(data_metrics);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ConcreteDgpConfig {
        &self.config
    }

    /// Run the benchmark, fanning sample evaluation out across a bounded
    /// worker pool (or synchronously for `n_workers = 0`).
    pub async fn run<F>(&self, dgp: Arc<D>, factory: Arc<F>) -> BenchResult<ConcreteDgpResults>
    where
        F: EstimatorFactory<D::Dataset>,
    {
        let metric_set = metric_set_for(&self.estimand)?;
        self.config.validate()?;
        let workers =
            resolve_worker_count(self.config.n_workers, self.config.num_samples_per_run)?;

        if workers == 0 {
            return self.run_sync(&*dgp, &*factory);
        }

        info!(
            workers,
            runs = self.config.num_sampling_runs,
            samples = self.config.num_samples_per_run,
            "running concrete DGP benchmark with a worker pool"
        );
        dgp.set_data_analysis_mode(self.config.data_analysis_mode);

        let num_samples = self.config.num_samples_per_run;
        let gate = Arc::new(Semaphore::new(workers));
        let mut performance_by_run = MetricSeries::new();
        let mut data_by_run = MetricSeries::new();

        for run_index in 0..self.config.num_sampling_runs {
            debug!(run = run_index + 1, "starting sampling run");

            let mut tasks: JoinSet<BenchResult<(usize, EstimandSample, D::Dataset)>> =
                JoinSet::new();
            for sample_index in 0..num_samples {
                let permit = acquire(&gate).await?;
                let dgp = Arc::clone(&dgp);
                let factory = Arc::clone(&factory);
                let estimand = self.estimand.clone();
                let class = metric_set.class();
                let stream = (run_index * num_samples + sample_index) as u64;
                let mut rng = task_rng(self.config.seed, stream);
                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    evaluate_sample(&*dgp, &*factory, &estimand, class, sample_index, &mut rng)
                });
            }

            // Arrival order is not storage order: results are slotted by
            // sample index before the run is reduced.
            let mut samples: Vec<Option<EstimandSample>> =
                (0..num_samples).map(|_| None).collect();
            let mut datasets: Vec<Option<D::Dataset>> = (0..num_samples).map(|_| None).collect();
            while let Some(joined) = tasks.join_next().await {
                let (index, sample, dataset) = joined??;
                samples[index] = Some(sample);
                datasets[index] = Some(dataset);
            }
            let samples = take_all(samples)?;
            debug!(run = run_index + 1, "done sampling for run");

            append_run_metrics(&self.estimand, &metric_set, &samples, &mut performance_by_run)?;

            if let Some(data_metrics) = self.active_data_metrics() {
                let datasets = take_all(datasets)?;
                let mut tasks: JoinSet<(usize, BTreeMap<String, f64>)> = JoinSet::new();
                for (index, dataset) in datasets.into_iter().enumerate() {
                    let permit = acquire(&gate).await?;
                    let data_metrics = Arc::clone(&data_metrics);
                    tasks.spawn_blocking(move || {
                        let _permit = permit;
                        (index, data_metrics(&dataset))
                    });
                }
                let mut described: Vec<Option<BTreeMap<String, f64>>> =
                    (0..num_samples).map(|_| None).collect();
                while let Some(joined) = tasks.join_next().await {
                    let (index, metrics) = joined?;
                    described[index] = Some(metrics);
                }
                append_run_data_metrics(take_all(described)?, &mut data_by_run);
                debug!(run = run_index + 1, "done data analysis for run");
            }
        }

        Ok(self.finish(performance_by_run, data_by_run))
    }

    /// Run the benchmark fully synchronously on the calling thread.
    ///
    /// This is the execution mode Tier 2 forces for nested benchmarks, and
    /// what `run` delegates to for `n_workers = 0`.
    pub fn run_sync<F>(&self, dgp: &D, factory: &F) -> BenchResult<ConcreteDgpResults>
    where
        F: EstimatorFactory<D::Dataset>,
    {
        let metric_set = metric_set_for(&self.estimand)?;
        self.config.validate()?;
        resolve_worker_count(self.config.n_workers, self.config.num_samples_per_run)?;

        info!(
            runs = self.config.num_sampling_runs,
            samples = self.config.num_samples_per_run,
            "running concrete DGP benchmark synchronously"
        );
        dgp.set_data_analysis_mode(self.config.data_analysis_mode);

        let num_samples = self.config.num_samples_per_run;
        let mut performance_by_run = MetricSeries::new();
        let mut data_by_run = MetricSeries::new();

        for run_index in 0..self.config.num_sampling_runs {
            debug!(run = run_index + 1, "starting sampling run");

            let mut samples = Vec::with_capacity(num_samples);
            let mut datasets = Vec::with_capacity(num_samples);
            for sample_index in 0..num_samples {
                let stream = (run_index * num_samples + sample_index) as u64;
                let mut rng = task_rng(self.config.seed, stream);
                let (_, sample, dataset) = evaluate_sample(
                    dgp,
                    factory,
                    &self.estimand,
                    metric_set.class(),
                    sample_index,
                    &mut rng,
                )?;
                samples.push(sample);
                datasets.push(dataset);
            }

            append_run_metrics(&self.estimand, &metric_set, &samples, &mut performance_by_run)?;

            if let Some(data_metrics) = self.active_data_metrics() {
                let described = datasets.iter().map(|d| data_metrics(d)).collect();
                append_run_data_metrics(described, &mut data_by_run);
            }
        }

        Ok(self.finish(performance_by_run, data_by_run))
    }

    fn active_data_metrics(&self) -> Option<DataMetricsFn<D::Dataset>> {
        if self.config.data_analysis_mode {
            self.data_metrics.clone()
        } else {
            None
        }
    }

    fn finish(
        &self,
        performance_by_run: MetricSeries,
        data_by_run: MetricSeries,
    ) -> ConcreteDgpResults {
        let performance = aggregate_metric_series(&performance_by_run, true);
        let data = aggregate_metric_series(&data_by_run, false);
        ConcreteDgpResults {
            performance,
            performance_by_run,
            data,
            data_by_run,
        }
    }
}

pub(crate) async fn acquire(
    gate: &Arc<Semaphore>,
) -> BenchResult<tokio::sync::OwnedSemaphorePermit> {
    Arc::clone(gate)
        .acquire_owned()
        .await
        .map_err(|_| BenchError::Worker("admission gate closed".to_string()))
}

fn take_all<T>(slots: Vec<Option<T>>) -> BenchResult<Vec<T>> {
    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| BenchError::Worker("result slot left empty".to_string())))
        .collect()
}

/// Apply each declared metric function once to the run's full sample set and
/// append the raw values to the run series.
fn append_run_metrics(
    estimand: &str,
    metric_set: &MetricSet,
    samples: &[EstimandSample],
    series: &mut MetricSeries,
) -> BenchResult<()> {
    let shape_error = |value: &crate::estimands::EffectValue| BenchError::ShapeMismatch {
        estimand: estimand.to_string(),
        expected: match metric_set {
            MetricSet::Average(_) => "scalar".to_string(),
            MetricSet::Individual(_) => "vector".to_string(),
        },
        actual: value.shape(),
    };

    match metric_set {
        MetricSet::Average(table) => {
            let mut estimates = Vec::with_capacity(samples.len());
            let mut truths = Vec::with_capacity(samples.len());
            for sample in samples {
                estimates.push(
                    sample
                        .estimate
                        .as_scalar()
                        .ok_or_else(|| shape_error(&sample.estimate))?,
                );
                truths.push(
                    sample
                        .ground_truth
                        .as_scalar()
                        .ok_or_else(|| shape_error(&sample.ground_truth))?,
                );
            }
            for (name, metric_fn) in *table {
                series
                    .entry((*name).to_string())
                    .or_default()
                    .push(metric_fn(&estimates, &truths));
            }
        }
        MetricSet::Individual(table) => {
            let mut estimates = Vec::with_capacity(samples.len());
            let mut truths = Vec::with_capacity(samples.len());
            for sample in samples {
                estimates.push(
                    sample
                        .estimate
                        .as_individual()
                        .ok_or_else(|| shape_error(&sample.estimate))?
                        .to_vec(),
                );
                truths.push(
                    sample
                        .ground_truth
                        .as_individual()
                        .ok_or_else(|| shape_error(&sample.ground_truth))?
                        .to_vec(),
                );
            }
            for (name, metric_fn) in *table {
                series
                    .entry((*name).to_string())
                    .or_default()
                    .push(metric_fn(&estimates, &truths));
            }
        }
    }
    Ok(())
}

/// Average each data metric across the run's samples and append the run
/// value to the series.
fn append_run_data_metrics(described: Vec<BTreeMap<String, f64>>, series: &mut MetricSeries) {
    let mut per_sample: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for metrics in described {
        for (name, value) in metrics {
            per_sample.entry(name).or_default().push(value);
        }
    }
    for (name, values) in per_sample {
        series.entry(name).or_default().push(mean(&values));
    }
}
