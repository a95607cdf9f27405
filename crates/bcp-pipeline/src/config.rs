// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, ReproMode};
use bcp_eval::DiagnoseConfig;
use bcp_model::{ChangePointModelSpec, ModelVariant, PriorConfig};
use bcp_preprocess::Transform;
use bcp_sampler::SamplerConfig;

const DEFAULT_K: usize = 1;
const DEFAULT_MIN_DIST: usize = 5;

/// Model family selected in an [`AnalysisConfig`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelChoice {
    #[default]
    Mean,
    Trend,
    Variance,
}

/// Every knob of one analysis run. Missing JSON fields take their defaults.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    pub model: ModelChoice,
    /// Number of change points; mean model only.
    pub k: usize,
    /// Minimum spacing between change points; mean model only.
    pub min_dist: usize,
    pub chains: usize,
    pub draws: usize,
    pub tune: usize,
    pub target_accept: f64,
    pub seed: u64,
    pub transform: Transform,
    pub priors: PriorConfig,
    pub rhat_threshold: f64,
    pub ess_floor_fraction: f64,
    pub time_budget_ms: Option<u64>,
    pub repro_mode: ReproMode,
    pub max_leapfrog: usize,
    pub trajectory_length: f64,
    pub discrete_moves: usize,
    pub max_divergence_fraction: f64,
    pub max_init_attempts: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let sampler = SamplerConfig::default();
        let diagnose = DiagnoseConfig::default();
        Self {
            model: ModelChoice::default(),
            k: DEFAULT_K,
            min_dist: DEFAULT_MIN_DIST,
            chains: sampler.chains,
            draws: sampler.draws,
            tune: sampler.tune,
            target_accept: sampler.target_accept,
            seed: sampler.seed,
            transform: Transform::default(),
            priors: PriorConfig::default(),
            rhat_threshold: diagnose.rhat_threshold,
            ess_floor_fraction: diagnose.ess_floor_fraction,
            time_budget_ms: None,
            repro_mode: ReproMode::default(),
            max_leapfrog: sampler.max_leapfrog,
            trajectory_length: sampler.trajectory_length,
            discrete_moves: sampler.discrete_moves,
            max_divergence_fraction: sampler.max_divergence_fraction,
            max_init_attempts: sampler.max_init_attempts,
        }
    }
}

impl AnalysisConfig {
    /// Rejects out-of-range or inconsistent settings with an invalid-config
    /// error. Feasibility against a concrete series is checked by the model
    /// builder.
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.model == ModelChoice::Mean {
            if self.k == 0 {
                return Err(BcpError::invalid_config(
                    "AnalysisConfig.k must be >= 1; got 0",
                ));
            }
            if self.min_dist == 0 {
                return Err(BcpError::invalid_config(
                    "AnalysisConfig.min_dist must be >= 1; got 0",
                ));
            }
        } else if self.k != DEFAULT_K {
            return Err(BcpError::invalid_config(format!(
                "AnalysisConfig.k={} is only supported by the mean model; {:?} fits one change point",
                self.k, self.model
            )));
        }
        if self.time_budget_ms == Some(0) {
            return Err(BcpError::invalid_config(
                "AnalysisConfig.time_budget_ms must be >= 1 when set; got 0",
            ));
        }
        self.priors.validate().map_err(|err| match err {
            BcpError::ModelConfig(message) => {
                BcpError::invalid_config(format!("AnalysisConfig.{message}"))
            }
            other => other,
        })?;
        self.sampler_config().validate()?;
        self.diagnose_config().validate()
    }

    pub fn model_spec(&self) -> ChangePointModelSpec {
        let variant = match self.model {
            ModelChoice::Mean => ModelVariant::MeanShift {
                k: self.k,
                min_dist: self.min_dist,
            },
            ModelChoice::Trend => ModelVariant::TrendShift,
            ModelChoice::Variance => ModelVariant::VarianceShift,
        };
        ChangePointModelSpec::new(variant).with_priors(self.priors)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            chains: self.chains,
            draws: self.draws,
            tune: self.tune,
            target_accept: self.target_accept,
            seed: self.seed,
            max_leapfrog: self.max_leapfrog,
            trajectory_length: self.trajectory_length,
            discrete_moves: self.discrete_moves,
            max_divergence_fraction: self.max_divergence_fraction,
            max_init_attempts: self.max_init_attempts,
            ..SamplerConfig::default()
        }
    }

    pub fn diagnose_config(&self) -> DiagnoseConfig {
        DiagnoseConfig {
            rhat_threshold: self.rhat_threshold,
            ess_floor_fraction: self.ess_floor_fraction,
        }
    }

    /// Parses and validates a JSON configuration.
    #[cfg(feature = "serde")]
    pub fn from_json(raw: &str) -> Result<Self, BcpError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| BcpError::invalid_config(format!("invalid analysis config JSON: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, BcpError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| BcpError::invalid_config(format!("cannot encode analysis config: {err}")))
    }
}
