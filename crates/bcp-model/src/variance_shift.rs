// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::density::{
    all_finite, gaussian_log_scale_term, half_normal_log_scale_prior, normal_prior,
};
use crate::prefix::PrefixMoments;
use crate::samples::{ChangePointKind, Draw, SegmentParams};
use crate::spec::PriorConfig;
use crate::standardize::Standardization;
use rand::Rng;

const DIM: usize = 3;

/// One change point `tau` between two noise scales around a shared mean.
///
/// Parameter layout: `[m, log_sigma_0, log_sigma_1]` on the standardized
/// scale.
#[derive(Clone, Debug, PartialEq)]
pub struct VarianceShiftModel {
    n: usize,
    lower: usize,
    upper: usize,
    prefix: PrefixMoments,
    priors: PriorConfig,
    scaling: Standardization,
}

impl VarianceShiftModel {
    pub(crate) fn new(
        values: &[f64],
        lower: usize,
        upper: usize,
        priors: PriorConfig,
        scaling: Standardization,
    ) -> Self {
        let z = scaling.apply(values);
        Self {
            n: z.len(),
            lower,
            upper,
            prefix: PrefixMoments::new(&z),
            priors,
            scaling,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn scaling(&self) -> Standardization {
        self.scaling
    }

    pub fn dim(&self) -> usize {
        DIM
    }

    pub fn support(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }

    pub fn kind(&self) -> ChangePointKind {
        ChangePointKind::Single {
            lower: self.lower,
            upper: self.upper,
        }
    }

    pub fn parameter_names(&self) -> Vec<String> {
        ["m", "log_sigma[0]", "log_sigma[1]"]
            .map(str::to_string)
            .to_vec()
    }

    pub fn log_density_and_gradient(&self, theta: &[f64], tau: usize, grad: &mut [f64]) -> f64 {
        grad.fill(0.0);
        if theta.len() != DIM || !all_finite(theta) || tau < self.lower || tau > self.upper {
            return f64::NEG_INFINITY;
        }

        let level = theta[0];
        let (mut logp, dlp) = normal_prior(level, self.priors.level_loc, self.priors.level_scale);
        grad[0] += dlp;

        for (segment, (start, end)) in [(0, tau), (tau, self.n)].into_iter().enumerate() {
            let log_sigma = theta[1 + segment];
            let moments = self.prefix.range(start, end);
            let rss = moments.rss(level);
            let inv_var = (-2.0 * log_sigma).exp();
            grad[0] += (moments.sum - moments.count * level) * inv_var;

            let (lik, dlik) = gaussian_log_scale_term(moments.count, rss, log_sigma);
            let (lp, dlp) = half_normal_log_scale_prior(log_sigma, self.priors.noise_scale);
            logp += lik + lp;
            grad[1 + segment] += dlik + dlp;
        }

        if logp.is_finite() {
            logp
        } else {
            f64::NEG_INFINITY
        }
    }

    pub fn initial_theta<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        vec![
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.5..0.5),
            rng.random_range(-1.5..0.5),
        ]
    }

    pub fn initial_tau<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(self.lower..=self.upper)
    }

    pub fn draw(&self, theta: &[f64], tau: usize, log_density: f64) -> Draw {
        Draw {
            positions: vec![tau],
            segments: SegmentParams::VarianceShift {
                mean: self.scaling.level(theta[0]),
                sigmas: [
                    self.scaling.spread(theta[1].exp()),
                    self.scaling.spread(theta[2].exp()),
                ],
            },
            log_density,
        }
    }
}
