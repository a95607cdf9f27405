// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::density::{
    all_finite, gaussian_log_scale_term, half_normal_log_scale_prior, normal_prior,
};
use crate::samples::{ChangePointKind, Draw, SegmentParams};
use crate::spec::PriorConfig;
use crate::standardize::Standardization;
use rand::Rng;

const DIM: usize = 5;

/// Prefix statistics for O(1) least-squares line queries over rescaled time.
#[derive(Clone, Debug, PartialEq)]
struct LinearCache {
    prefix_x: Vec<f64>,
    prefix_x_sq: Vec<f64>,
    prefix_z: Vec<f64>,
    prefix_z_sq: Vec<f64>,
    prefix_xz: Vec<f64>,
}

#[derive(Clone, Copy, Debug, Default)]
struct LinearMoments {
    count: f64,
    x: f64,
    x_sq: f64,
    z: f64,
    z_sq: f64,
    xz: f64,
}

impl LinearMoments {
    /// `sum (z - slope * x - intercept)^2`.
    fn rss(&self, slope: f64, intercept: f64) -> f64 {
        (self.z_sq - 2.0 * slope * self.xz - 2.0 * intercept * self.z
            + slope * slope * self.x_sq
            + 2.0 * slope * intercept * self.x
            + intercept * intercept * self.count)
            .max(0.0)
    }
}

impl LinearCache {
    fn new(z: &[f64]) -> Self {
        let n = z.len();
        let mut cache = Self {
            prefix_x: vec![0.0; n + 1],
            prefix_x_sq: vec![0.0; n + 1],
            prefix_z: vec![0.0; n + 1],
            prefix_z_sq: vec![0.0; n + 1],
            prefix_xz: vec![0.0; n + 1],
        };
        for (t, &value) in z.iter().enumerate() {
            let x = rescaled_time(t, n);
            cache.prefix_x[t + 1] = cache.prefix_x[t] + x;
            cache.prefix_x_sq[t + 1] = cache.prefix_x_sq[t] + x * x;
            cache.prefix_z[t + 1] = cache.prefix_z[t] + value;
            cache.prefix_z_sq[t + 1] = cache.prefix_z_sq[t] + value * value;
            cache.prefix_xz[t + 1] = cache.prefix_xz[t] + x * value;
        }
        cache
    }

    fn range(&self, start: usize, end: usize) -> LinearMoments {
        LinearMoments {
            count: (end - start) as f64,
            x: self.prefix_x[end] - self.prefix_x[start],
            x_sq: self.prefix_x_sq[end] - self.prefix_x_sq[start],
            z: self.prefix_z[end] - self.prefix_z[start],
            z_sq: self.prefix_z_sq[end] - self.prefix_z_sq[start],
            xz: self.prefix_xz[end] - self.prefix_xz[start],
        }
    }
}

/// Maps position `t` of `n` onto `[-1, 1]`.
fn rescaled_time(t: usize, n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    2.0 * t as f64 / (n - 1) as f64 - 1.0
}

/// One change point `tau` between two lines with shared noise.
///
/// Parameter layout: `[slope_0, intercept_0, slope_1, intercept_1, log_sigma]`
/// over rescaled time `x in [-1, 1]` on the standardized scale. Observation
/// `t` follows line 1 iff `t >= tau`.
#[derive(Clone, Debug, PartialEq)]
pub struct TrendShiftModel {
    n: usize,
    lower: usize,
    upper: usize,
    cache: LinearCache,
    priors: PriorConfig,
    scaling: Standardization,
}

impl TrendShiftModel {
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
            cache: LinearCache::new(&z),
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

    /// Inclusive support of `tau`.
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
        ["slope[0]", "intercept[0]", "slope[1]", "intercept[1]", "log_sigma"]
            .map(str::to_string)
            .to_vec()
    }

    pub fn log_density_and_gradient(&self, theta: &[f64], tau: usize, grad: &mut [f64]) -> f64 {
        grad.fill(0.0);
        if theta.len() != DIM || !all_finite(theta) || tau < self.lower || tau > self.upper {
            return f64::NEG_INFINITY;
        }

        let log_sigma = theta[4];
        let inv_var = (-2.0 * log_sigma).exp();
        let mut rss = 0.0;
        let mut logp = 0.0;

        for (segment, (start, end)) in [(0, tau), (tau, self.n)].into_iter().enumerate() {
            let slope = theta[2 * segment];
            let intercept = theta[2 * segment + 1];
            let moments = self.cache.range(start, end);
            rss += moments.rss(slope, intercept);
            grad[2 * segment] +=
                (moments.xz - slope * moments.x_sq - intercept * moments.x) * inv_var;
            grad[2 * segment + 1] +=
                (moments.z - slope * moments.x - intercept * moments.count) * inv_var;

            let (lp, dlp) = normal_prior(slope, 0.0, self.priors.slope_scale);
            logp += lp;
            grad[2 * segment] += dlp;
            let (lp, dlp) = normal_prior(intercept, self.priors.level_loc, self.priors.level_scale);
            logp += lp;
            grad[2 * segment + 1] += dlp;
        }

        let (lik, dlik) = gaussian_log_scale_term(self.n as f64, rss, log_sigma);
        logp += lik;
        grad[4] += dlik;

        let (lp, dlp) = half_normal_log_scale_prior(log_sigma, self.priors.noise_scale);
        logp += lp;
        grad[4] += dlp;

        if logp.is_finite() {
            logp
        } else {
            f64::NEG_INFINITY
        }
    }

    pub fn initial_theta<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let mut theta = (0..4)
            .map(|_| rng.random_range(-2.0..2.0))
            .collect::<Vec<f64>>();
        theta.push(rng.random_range(-1.5..0.5));
        theta
    }

    pub fn initial_tau<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(self.lower..=self.upper)
    }

    /// Slopes are per position; intercepts are the line values at position 0.
    pub fn draw(&self, theta: &[f64], tau: usize, log_density: f64) -> Draw {
        let per_position = 2.0 / (self.n.max(2) - 1) as f64;
        let slope = |a: f64| self.scaling.spread(a) * per_position;
        let intercept = |a: f64, b: f64| self.scaling.level(b - a);
        Draw {
            positions: vec![tau],
            segments: SegmentParams::TrendShift {
                slopes: [slope(theta[0]), slope(theta[2])],
                intercepts: [intercept(theta[0], theta[1]), intercept(theta[2], theta[3])],
                sigma: self.scaling.spread(theta[4].exp()),
            },
            log_density,
        }
    }
}
