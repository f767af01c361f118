//! Synthetic reference implementations of the collaborator contracts.
//!
//! Deterministic given a seeded RNG and cheap enough for CI, these are the
//! default way to exercise the benchmark engine without a real
//! data-generation or modeling stack:
//!
//! - [`SyntheticDgp`] draws datasets with Normal-distributed individual
//!   effects and Bernoulli treatment assignment.
//! - [`FixedEstimator`] returns a constant estimate, which makes expected
//!   metric values exactly computable.
//! - [`DiffInMeansEstimator`] is a naive but real estimator exercising the
//!   fit path.
//! - [`SyntheticDgpSampler`] builds `SyntheticDgp`s from a
//!   [`ParameterConfig`] and a [`StaticCovariateSource`].

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution, Normal};

use crate::contracts::{
    DataGeneratingProcess, Estimator, EstimatorFactory, GeneratedDataset, SpecificationSampler,
};
use crate::error::DynError;
use crate::estimands::{EffectValue, ATE, ATT, ITE};
use crate::params::ParameterConfig;

/// Configuration for a [`SyntheticDgp`].
#[derive(Debug, Clone)]
pub struct SyntheticDgpConfig {
    /// Observations per drawn dataset.
    pub n_observations: usize,
    /// Center of the individual-effect distribution.
    pub true_effect: f64,
    /// Standard deviation of individual effects around `true_effect`.
    pub effect_heterogeneity: f64,
    /// Probability an observation is treated.
    pub treatment_probability: f64,
    /// Standard deviation of the outcome noise.
    pub outcome_noise: f64,
}

impl Default for SyntheticDgpConfig {
    fn default() -> Self {
        Self {
            n_observations: 100,
            true_effect: 1.0,
            effect_heterogeneity: 0.0,
            treatment_probability: 0.5,
            outcome_noise: 1.0,
        }
    }
}

/// A DGP over a linear outcome model with known individual effects.
#[derive(Debug)]
pub struct SyntheticDgp {
    config: SyntheticDgpConfig,
    data_analysis_mode: AtomicBool,
}

impl SyntheticDgp {
    /// Create a DGP from its configuration.
    pub fn new(config: SyntheticDgpConfig) -> Self {
        Self {
            config,
            data_analysis_mode: AtomicBool::new(false),
        }
    }

    /// The configured true effect.
    pub fn true_effect(&self) -> f64 {
        self.config.true_effect
    }
}

fn draw(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64) -> Result<f64, DynError> {
    if std_dev > 0.0 {
        let normal = Normal::new(mean, std_dev).map_err(|e| Box::new(e) as DynError)?;
        Ok(normal.sample(rng))
    } else {
        Ok(mean)
    }
}

impl DataGeneratingProcess for SyntheticDgp {
    type Dataset = SyntheticDataset;

    fn n_observations(&self) -> usize {
        self.config.n_observations
    }

    fn set_data_analysis_mode(&self, enabled: bool) {
        self.data_analysis_mode.store(enabled, Ordering::Relaxed);
    }

    fn sample_dataset(&self, rng: &mut ChaCha8Rng) -> Result<Self::Dataset, DynError> {
        let n = self.config.n_observations;
        let assignment = Bernoulli::new(self.config.treatment_probability)
            .map_err(|e| Box::new(e) as DynError)?;

        let mut individual_effects = Vec::with_capacity(n);
        let mut treated = Vec::with_capacity(n);
        let mut outcomes = Vec::with_capacity(n);
        for _ in 0..n {
            let effect = draw(rng, self.config.true_effect, self.config.effect_heterogeneity)?;
            let is_treated = assignment.sample(rng);
            let baseline: f64 = rng.gen_range(-1.0..1.0);
            let noise = draw(rng, 0.0, self.config.outcome_noise)?;
            individual_effects.push(effect);
            treated.push(is_treated);
            outcomes.push(baseline + noise + if is_treated { effect } else { 0.0 });
        }

        Ok(SyntheticDataset {
            individual_effects,
            treated,
            outcomes,
            analyzed: self.data_analysis_mode.load(Ordering::Relaxed),
        })
    }
}

/// A dataset drawn from a [`SyntheticDgp`].
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    /// Oracle per-observation treatment effects.
    pub individual_effects: Vec<f64>,
    /// Treatment indicators.
    pub treated: Vec<bool>,
    /// Observed outcomes.
    pub outcomes: Vec<f64>,
    /// Whether the dataset was drawn with data-analysis mode enabled.
    pub analyzed: bool,
}

impl SyntheticDataset {
    /// Fraction of treated observations.
    pub fn treatment_share(&self) -> f64 {
        let treated = self.treated.iter().filter(|t| **t).count();
        treated as f64 / self.treated.len() as f64
    }
}

fn mean_of(values: impl Iterator<Item = f64>) -> (f64, usize) {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    (sum / count as f64, count)
}

impl GeneratedDataset for SyntheticDataset {
    fn n_observations(&self) -> usize {
        self.individual_effects.len()
    }

    fn ground_truth(&self, estimand: &str) -> Result<EffectValue, DynError> {
        match estimand {
            ATE => {
                let (mean, _) = mean_of(self.individual_effects.iter().copied());
                Ok(EffectValue::Scalar(mean))
            }
            ATT => {
                let (mean, count) = mean_of(
                    self.individual_effects
                        .iter()
                        .zip(&self.treated)
                        .filter(|(_, t)| **t)
                        .map(|(e, _)| *e),
                );
                if count == 0 {
                    return Err("no treated observations in sampled dataset".into());
                }
                Ok(EffectValue::Scalar(mean))
            }
            ITE => Ok(EffectValue::Individual(self.individual_effects.clone())),
            other => Err(format!("dataset has no ground truth for estimand {other:?}").into()),
        }
    }
}

/// An estimator that reports a fixed value for every estimand.
pub struct FixedEstimator {
    value: f64,
    n_observations: usize,
    fitted: bool,
}

impl Estimator for FixedEstimator {
    fn fit(&mut self) -> Result<(), DynError> {
        self.fitted = true;
        Ok(())
    }

    fn estimate(&self, estimand: &str) -> Result<EffectValue, DynError> {
        if !self.fitted {
            return Err("estimate() called before fit()".into());
        }
        match estimand {
            ITE => Ok(EffectValue::Individual(vec![
                self.value;
                self.n_observations
            ])),
            _ => Ok(EffectValue::Scalar(self.value)),
        }
    }
}

/// Factory for [`FixedEstimator`].
#[derive(Debug, Clone, Copy)]
pub struct FixedEstimatorFactory {
    /// The constant estimate every instance reports.
    pub value: f64,
}

impl FixedEstimatorFactory {
    /// Estimators built by this factory always estimate `value`.
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl EstimatorFactory<SyntheticDataset> for FixedEstimatorFactory {
    fn build(&self, dataset: &SyntheticDataset) -> Result<Box<dyn Estimator>, DynError> {
        Ok(Box::new(FixedEstimator {
            value: self.value,
            n_observations: dataset.n_observations(),
            fitted: false,
        }))
    }
}

/// Difference-in-means estimator over the synthetic outcome model.
///
/// Estimates every estimand with the treated-minus-control outcome mean;
/// for `ITE` the single estimate is replicated per observation.
pub struct DiffInMeansEstimator {
    outcomes: Vec<f64>,
    treated: Vec<bool>,
    effect: Option<f64>,
}

impl Estimator for DiffInMeansEstimator {
    fn fit(&mut self) -> Result<(), DynError> {
        let (treated_mean, treated_count) = mean_of(
            self.outcomes
                .iter()
                .zip(&self.treated)
                .filter(|(_, t)| **t)
                .map(|(y, _)| *y),
        );
        let (control_mean, control_count) = mean_of(
            self.outcomes
                .iter()
                .zip(&self.treated)
                .filter(|(_, t)| !**t)
                .map(|(y, _)| *y),
        );
        if treated_count == 0 || control_count == 0 {
            return Err("difference in means needs both treated and control units".into());
        }
        self.effect = Some(treated_mean - control_mean);
        Ok(())
    }

    fn estimate(&self, estimand: &str) -> Result<EffectValue, DynError> {
        let value = self.effect.ok_or("estimate() called before fit()")?;
        match estimand {
            ITE => Ok(EffectValue::Individual(vec![value; self.outcomes.len()])),
            _ => Ok(EffectValue::Scalar(value)),
        }
    }
}

/// Factory for [`DiffInMeansEstimator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffInMeansFactory;

impl EstimatorFactory<SyntheticDataset> for DiffInMeansFactory {
    fn build(&self, dataset: &SyntheticDataset) -> Result<Box<dyn Estimator>, DynError> {
        Ok(Box::new(DiffInMeansEstimator {
            outcomes: dataset.outcomes.clone(),
            treated: dataset.treated.clone(),
            effect: None,
        }))
    }
}

/// Covariate source fixing the observation count of sampled DGPs.
#[derive(Debug, Clone, Copy)]
pub struct StaticCovariateSource {
    /// Observations every sampled DGP will draw per dataset.
    pub n_observations: usize,
}

impl StaticCovariateSource {
    /// A source producing `n_observations` observations.
    pub fn new(n_observations: usize) -> Self {
        Self { n_observations }
    }
}

/// Samples [`SyntheticDgp`]s from parameter values.
///
/// Recognized parameters (all optional): `true_effect`,
/// `effect_heterogeneity`, `treatment_probability`, `outcome_noise`, and
/// `effect_spread` — the standard deviation of the DGP-level true effect
/// around the configured `true_effect`, which is what makes independently
/// sampled DGPs differ from one another.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticDgpSampler;

impl SpecificationSampler for SyntheticDgpSampler {
    type Source = StaticCovariateSource;
    type Dgp = SyntheticDgp;

    fn sample_dgp(
        &self,
        params: &ParameterConfig,
        source: &Self::Source,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self::Dgp, DynError> {
        let spread = params.number_or("effect_spread", 0.0);
        let true_effect = draw(rng, params.number_or("true_effect", 1.0), spread)?;
        Ok(SyntheticDgp::new(SyntheticDgpConfig {
            n_observations: source.n_observations,
            true_effect,
            effect_heterogeneity: params.number_or("effect_heterogeneity", 0.0),
            treatment_probability: params.number_or("treatment_probability", 0.5),
            outcome_noise: params.number_or("outcome_noise", 1.0),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_dgp_is_deterministic_under_fixed_seed() {
        let dgp = SyntheticDgp::new(SyntheticDgpConfig::default());
        let a = dgp.sample_dataset(&mut rng(7)).unwrap();
        let b = dgp.sample_dataset(&mut rng(7)).unwrap();
        assert_eq!(a.outcomes, b.outcomes);
        assert_eq!(a.treated, b.treated);
    }

    #[test]
    fn test_homogeneous_effects_give_exact_ground_truth() {
        let dgp = SyntheticDgp::new(SyntheticDgpConfig {
            true_effect: 2.0,
            ..Default::default()
        });
        let dataset = dgp.sample_dataset(&mut rng(1)).unwrap();
        match dataset.ground_truth(ATE).unwrap() {
            EffectValue::Scalar(v) => assert_eq!(v, 2.0),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_ite_ground_truth_has_observation_length() {
        let dgp = SyntheticDgp::new(SyntheticDgpConfig {
            n_observations: 17,
            effect_heterogeneity: 0.5,
            ..Default::default()
        });
        let dataset = dgp.sample_dataset(&mut rng(3)).unwrap();
        match dataset.ground_truth(ITE).unwrap() {
            EffectValue::Individual(v) => assert_eq!(v.len(), 17),
            other => panic!("expected vector, got {other:?}"),
        }
    }

    #[test]
    fn test_fixed_estimator_requires_fit() {
        let dataset = SyntheticDgp::new(SyntheticDgpConfig::default())
            .sample_dataset(&mut rng(5))
            .unwrap();
        let factory = FixedEstimatorFactory::new(2.2);
        let mut estimator = factory.build(&dataset).unwrap();
        assert!(estimator.estimate(ATE).is_err());
        estimator.fit().unwrap();
        match estimator.estimate(ATE).unwrap() {
            EffectValue::Scalar(v) => assert_eq!(v, 2.2),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_diff_in_means_recovers_effect_roughly() {
        let dgp = SyntheticDgp::new(SyntheticDgpConfig {
            n_observations: 4000,
            true_effect: 2.0,
            outcome_noise: 0.5,
            ..Default::default()
        });
        let dataset = dgp.sample_dataset(&mut rng(11)).unwrap();
        let mut estimator = DiffInMeansFactory.build(&dataset).unwrap();
        estimator.fit().unwrap();
        match estimator.estimate(ATE).unwrap() {
            EffectValue::Scalar(v) => {
                assert!((v - 2.0).abs() < 0.15, "estimate {v} too far from 2.0")
            }
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_sampler_reads_params_and_source() {
        let sampler = SyntheticDgpSampler;
        let params = ParameterConfig::new().with_parameter("true_effect", 3.0);
        let source = StaticCovariateSource::new(25);
        let dgp = sampler.sample_dgp(&params, &source, &mut rng(9)).unwrap();
        assert_eq!(dgp.n_observations(), 25);
        assert_eq!(dgp.true_effect(), 3.0);
    }

    #[test]
    fn test_effect_spread_varies_sampled_dgps() {
        let sampler = SyntheticDgpSampler;
        let params = ParameterConfig::new()
            .with_parameter("true_effect", 1.0)
            .with_parameter("effect_spread", 0.5);
        let source = StaticCovariateSource::new(10);
        let mut r = rng(13);
        let a = sampler.sample_dgp(&params, &source, &mut r).unwrap();
        let b = sampler.sample_dgp(&params, &source, &mut r).unwrap();
        assert_ne!(a.true_effect(), b.true_effect());
    }
}
