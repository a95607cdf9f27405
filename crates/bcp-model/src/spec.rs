// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;

const DEFAULT_LEVEL_LOC: f64 = 0.0;
const DEFAULT_LEVEL_SCALE: f64 = 5.0;
const DEFAULT_SLOPE_SCALE: f64 = 5.0;
const DEFAULT_NOISE_SCALE: f64 = 2.0;

/// Which piecewise structure to fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelVariant {
    /// `k` ordered change points, `k + 1` segment means, shared noise.
    MeanShift { k: usize, min_dist: usize },
    /// One change point between two linear trends, shared noise.
    TrendShift,
    /// One change point between two noise scales, shared mean.
    VarianceShift,
}

impl ModelVariant {
    pub const fn label(self) -> &'static str {
        match self {
            Self::MeanShift { .. } => "mean_shift",
            Self::TrendShift => "trend_shift",
            Self::VarianceShift => "variance_shift",
        }
    }
}

/// Prior hyperparameters in units of the series' standard deviation,
/// centred on the series mean.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorConfig {
    /// Normal location of segment levels.
    pub level_loc: f64,
    /// Normal scale of segment levels.
    pub level_scale: f64,
    /// Normal scale of trend slopes (per unit of rescaled time).
    pub slope_scale: f64,
    /// HalfNormal scale of noise standard deviations.
    pub noise_scale: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            level_loc: DEFAULT_LEVEL_LOC,
            level_scale: DEFAULT_LEVEL_SCALE,
            slope_scale: DEFAULT_SLOPE_SCALE,
            noise_scale: DEFAULT_NOISE_SCALE,
        }
    }
}

impl PriorConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if !self.level_loc.is_finite() {
            return Err(BcpError::model_config(format!(
                "priors.level_loc must be finite; got {}",
                self.level_loc
            )));
        }
        for (name, value) in [
            ("level_scale", self.level_scale),
            ("slope_scale", self.slope_scale),
            ("noise_scale", self.noise_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BcpError::model_config(format!(
                    "priors.{name} must be finite and > 0; got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Full model request handed to [`crate::build`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChangePointModelSpec {
    pub variant: ModelVariant,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priors: PriorConfig,
}

impl ChangePointModelSpec {
    pub fn new(variant: ModelVariant) -> Self {
        Self {
            variant,
            priors: PriorConfig::default(),
        }
    }

    pub fn mean_shift(k: usize, min_dist: usize) -> Self {
        Self::new(ModelVariant::MeanShift { k, min_dist })
    }

    pub fn trend_shift() -> Self {
        Self::new(ModelVariant::TrendShift)
    }

    pub fn variance_shift() -> Self {
        Self::new(ModelVariant::VarianceShift)
    }

    pub fn with_priors(mut self, priors: PriorConfig) -> Self {
        self.priors = priors;
        self
    }
}
