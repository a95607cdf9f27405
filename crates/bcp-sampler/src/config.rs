// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;

const DEFAULT_CHAINS: usize = 4;
const DEFAULT_DRAWS: usize = 2000;
const DEFAULT_TUNE: usize = 1000;
const DEFAULT_TARGET_ACCEPT: f64 = 0.9;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_MAX_LEAPFROG: usize = 256;
const DEFAULT_TRAJECTORY_LENGTH: f64 = 2.0;
const DEFAULT_DISCRETE_MOVES: usize = 4;
const DEFAULT_MAX_DIVERGENCE_FRACTION: f64 = 0.3;
const DEFAULT_MAX_INIT_ATTEMPTS: usize = 20;
const DEFAULT_CANCEL_CHECK_EVERY: usize = 1;
const RETRY_TARGET_ACCEPT_CAP: f64 = 0.99;

/// Configuration for [`crate::sample`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    pub chains: usize,
    /// Retained draws per chain.
    pub draws: usize,
    /// Discarded adaptation iterations per chain.
    pub tune: usize,
    /// Dual-averaging acceptance target, in `(0, 1)`.
    pub target_accept: f64,
    pub seed: u64,
    /// Upper bound on leapfrog steps per HMC transition.
    pub max_leapfrog: usize,
    /// Nominal integration time; each transition jitters it by up to 50%.
    pub trajectory_length: f64,
    /// Metropolis updates of the discrete change point, or relocations of
    /// mean-shift placements, per iteration.
    pub discrete_moves: usize,
    /// A chain fails when more post-tuning transitions than this diverge.
    pub max_divergence_fraction: f64,
    pub max_init_attempts: usize,
    /// Iterations between cancellation and time-budget polls.
    pub cancel_check_every: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: DEFAULT_CHAINS,
            draws: DEFAULT_DRAWS,
            tune: DEFAULT_TUNE,
            target_accept: DEFAULT_TARGET_ACCEPT,
            seed: DEFAULT_SEED,
            max_leapfrog: DEFAULT_MAX_LEAPFROG,
            trajectory_length: DEFAULT_TRAJECTORY_LENGTH,
            discrete_moves: DEFAULT_DISCRETE_MOVES,
            max_divergence_fraction: DEFAULT_MAX_DIVERGENCE_FRACTION,
            max_init_attempts: DEFAULT_MAX_INIT_ATTEMPTS,
            cancel_check_every: DEFAULT_CANCEL_CHECK_EVERY,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.chains == 0 {
            return Err(BcpError::invalid_config(
                "SamplerConfig.chains must be >= 1; got 0",
            ));
        }
        if self.draws == 0 {
            return Err(BcpError::invalid_config(
                "SamplerConfig.draws must be >= 1; got 0",
            ));
        }
        if !self.target_accept.is_finite()
            || self.target_accept <= 0.0
            || self.target_accept >= 1.0
        {
            return Err(BcpError::invalid_config(format!(
                "SamplerConfig.target_accept must be in (0, 1); got {}",
                self.target_accept
            )));
        }
        if self.max_leapfrog == 0 {
            return Err(BcpError::invalid_config(
                "SamplerConfig.max_leapfrog must be >= 1; got 0",
            ));
        }
        if !self.trajectory_length.is_finite() || self.trajectory_length <= 0.0 {
            return Err(BcpError::invalid_config(format!(
                "SamplerConfig.trajectory_length must be finite and > 0; got {}",
                self.trajectory_length
            )));
        }
        if !(0.0..=1.0).contains(&self.max_divergence_fraction) {
            return Err(BcpError::invalid_config(format!(
                "SamplerConfig.max_divergence_fraction must be in [0, 1]; got {}",
                self.max_divergence_fraction
            )));
        }
        if self.max_init_attempts == 0 {
            return Err(BcpError::invalid_config(
                "SamplerConfig.max_init_attempts must be >= 1; got 0",
            ));
        }
        Ok(())
    }

    /// Settings for the single retry after a divergence failure:
    /// `target_accept` moves halfway to 1, capped at 0.99.
    pub fn conservative(&self) -> Self {
        Self {
            target_accept: ((self.target_accept + 1.0) / 2.0).min(RETRY_TARGET_ACCEPT_CAP),
            ..self.clone()
        }
    }

    pub(crate) fn normalized_cancel_check_every(&self) -> usize {
        self.cancel_check_every.max(1)
    }
}
