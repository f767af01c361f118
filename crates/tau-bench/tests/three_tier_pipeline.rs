//! End-to-end exercise of the three-tier pipeline through the public API:
//! a grid sweep over sampled DGPs, benchmarked with a real (if naive)
//! estimator, rendered into both report formats.

use std::collections::BTreeMap;
use std::sync::Arc;

use tau_bench::config::SampledDgpConfig;
use tau_bench::estimands::{ATE, ITE};
use tau_bench::params::{ParameterAssignment, ParameterConfig, ParameterGrid};
use tau_bench::runners::{GridSweepRunner, SampledDgpRunner};
use tau_bench::synthetic::{
    DiffInMeansFactory, StaticCovariateSource, SyntheticDataset, SyntheticDgpSampler,
};
use tau_bench::{DataMetricsFn, ReportFormat, SweepReport};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn build_config(assignment: &ParameterAssignment) -> ParameterConfig {
    let mut params = ParameterConfig::new();
    for (name, value) in assignment {
        params.set_parameter(name.clone(), value.clone());
    }
    params
}

fn tier2_config() -> SampledDgpConfig {
    SampledDgpConfig {
        num_dgp_samples: 3,
        num_sampling_runs_per_dgp: 2,
        num_samples_from_dgp: 4,
        data_analysis_mode: true,
        data_metric_intervals: true,
        n_workers: -1,
        seed: Some(20260804),
        ..Default::default()
    }
}

fn describe() -> DataMetricsFn<SyntheticDataset> {
    Arc::new(|dataset: &SyntheticDataset| {
        BTreeMap::from([
            ("treatment_share".to_string(), dataset.treatment_share()),
            (
                "n_observations".to_string(),
                dataset.individual_effects.len() as f64,
            ),
        ])
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sweep_with_diff_in_means_estimator() {
    init_tracing();
    let grid = ParameterGrid::new()
        .axis("true_effect", [1.0, 2.0])
        .axis("outcome_noise", [0.25]);

    let runner = GridSweepRunner::new(ATE)
        .with_config(tier2_config())
        .with_data_metrics(describe());
    let results = runner
        .run(
            &grid,
            build_config,
            Arc::new(SyntheticDgpSampler),
            Arc::new(StaticCovariateSource::new(600)),
            Arc::new(DiffInMeansFactory),
        )
        .await
        .expect("sweep should succeed");

    assert_eq!(results.rows.len(), 2);
    for row in &results.rows {
        // Difference in means on 600 low-noise observations lands near the
        // true effect, so the RMSE stays small relative to the effect.
        assert!(row.performance["RMSE"].mean < 0.5);
        assert!(row.performance["RMSE"].std.is_some());
        // Data metrics rode along with across-DGP intervals.
        let share = &row.data["treatment_share"];
        assert!(share.mean > 0.2 && share.mean < 0.8);
        assert!(share.std.is_some());
        assert_eq!(row.data["n_observations"].mean, 600.0);
    }

    let report = SweepReport::new(results);
    let json = report.to_json().expect("JSON report");
    assert!(json.contains("param_true_effect"));
    let markdown = report.to_markdown();
    assert!(markdown.starts_with('|'));

    let dir = std::env::temp_dir().join("tau-bench-report-test");
    std::fs::create_dir_all(&dir).expect("temp dir");
    let base = dir.join("sweep");
    report
        .write_to_file(ReportFormat::Both, &base)
        .expect("report files");
    assert!(base.with_extension("json").exists());
    assert!(base.with_extension("md").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn individual_effect_pipeline_reports_pehe() {
    init_tracing();
    let params = ParameterConfig::new()
        .with_parameter("true_effect", 1.0)
        .with_parameter("effect_heterogeneity", 0.5)
        .with_parameter("outcome_noise", 0.25);

    let runner = SampledDgpRunner::new(ITE).with_config(tier2_config());
    let results = runner
        .run(
            Arc::new(SyntheticDgpSampler),
            &params,
            Arc::new(StaticCovariateSource::new(200)),
            Arc::new(DiffInMeansFactory),
        )
        .await
        .expect("benchmark should succeed");

    // A constant-effect estimator cannot capture heterogeneity, so PEHE is
    // bounded below by roughly the heterogeneity scale.
    let pehe = &results.performance["PEHE"];
    assert!(pehe.mean > 0.3, "PEHE {} unexpectedly small", pehe.mean);
    assert_eq!(results.dgps.len(), 3);
    assert_eq!(results.run_series_by_dgp["PEHE"].len(), 3);
}
