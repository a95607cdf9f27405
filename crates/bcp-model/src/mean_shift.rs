// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::density::{
    all_finite, gaussian_log_scale_term, half_normal_log_scale_prior, normal_prior,
};
use crate::positions::PositionMap;
use crate::prefix::{PrefixMoments, SegmentMoments};
use crate::samples::{ChangePointKind, Draw, SegmentParams};
use crate::spec::PriorConfig;
use crate::standardize::Standardization;
use rand::Rng;

/// `k` ordered change points separating `k + 1` constant levels with shared
/// Gaussian noise.
///
/// Parameter layout: `[u_0..u_{k-1}, m_0..m_k, log_sigma]`, all on the
/// standardized scale. Positions come from [`PositionMap`]. The likelihood
/// relaxes each boundary continuously: the observation straddled by boundary
/// `c_i` has mean `f * m_i + (1 - f) * m_{i+1}` with `f = c_i - floor(c_i)`,
/// which keeps the density differentiable in `u`.
#[derive(Clone, Debug, PartialEq)]
pub struct MeanShiftModel {
    map: PositionMap,
    z: Vec<f64>,
    prefix: PrefixMoments,
    priors: PriorConfig,
    scaling: Standardization,
}

impl MeanShiftModel {
    pub(crate) fn new(
        values: &[f64],
        k: usize,
        min_dist: usize,
        priors: PriorConfig,
        scaling: Standardization,
    ) -> Self {
        let z = scaling.apply(values);
        let prefix = PrefixMoments::new(&z);
        Self {
            map: PositionMap::new(z.len(), k, min_dist),
            z,
            prefix,
            priors,
            scaling,
        }
    }

    pub fn k(&self) -> usize {
        self.map.k()
    }

    pub fn min_dist(&self) -> usize {
        self.map.min_dist()
    }

    pub fn n(&self) -> usize {
        self.z.len()
    }

    pub fn position_map(&self) -> &PositionMap {
        &self.map
    }

    pub fn scaling(&self) -> Standardization {
        self.scaling
    }

    pub fn dim(&self) -> usize {
        2 * self.k() + 2
    }

    pub fn kind(&self) -> ChangePointKind {
        ChangePointKind::Ordered {
            k: self.k(),
            min_dist: self.min_dist(),
        }
    }

    pub fn parameter_names(&self) -> Vec<String> {
        let k = self.k();
        (0..k)
            .map(|i| format!("u[{i}]"))
            .chain((0..=k).map(|j| format!("m[{j}]")))
            .chain(std::iter::once("log_sigma".to_string()))
            .collect()
    }

    /// Moments of the standardized series between the rounded positions
    /// of `latents`, one entry per segment.
    pub fn segment_moments(&self, latents: &[f64]) -> Vec<SegmentMoments> {
        let mut start = 0;
        self.map
            .positions(latents)
            .into_iter()
            .chain(std::iter::once(self.n()))
            .map(|end| {
                let moments = self.prefix.range(start, end);
                start = end;
                moments
            })
            .collect()
    }

    pub fn log_density_and_gradient(&self, theta: &[f64], grad: &mut [f64]) -> f64 {
        grad.fill(0.0);
        if theta.len() != self.dim() || !all_finite(theta) {
            return f64::NEG_INFINITY;
        }

        let k = self.k();
        let n = self.n();
        let (latents, rest) = theta.split_at(k);
        let (levels, tail) = rest.split_at(k + 1);
        let log_sigma = tail[0];
        let inv_var = (-2.0 * log_sigma).exp();

        let shares = self.map.shares(latents);
        let log_shares = self.map.log_shares(latents);
        let cumulative = self.map.cumulative(&shares);

        let mut rss = 0.0;
        let mut boundary_slopes = vec![0.0; k];
        let mut lo = 0usize;
        for j in 0..=k {
            let level = levels[j];
            let (hi, straddle) = if j < k {
                let c = self.map.boundary(j, cumulative[j]);
                let a = (c.floor().max(0.0) as usize).min(n - 1).max(lo);
                (a, Some((a, (c - a as f64).clamp(0.0, 1.0))))
            } else {
                (n, None)
            };

            let segment = self.prefix.range(lo, hi);
            rss += segment.rss(level);
            grad[k + j] += (segment.sum - segment.count * level) * inv_var;

            if let Some((a, frac)) = straddle {
                let next = levels[j + 1];
                let mean = frac * level + (1.0 - frac) * next;
                let resid = self.z[a] - mean;
                rss += resid * resid;
                let weighted = resid * inv_var;
                grad[k + j] += weighted * frac;
                grad[k + j + 1] += weighted * (1.0 - frac);
                boundary_slopes[j] = weighted * (level - next);
                lo = a + 1;
            }
        }

        let (lik, dlik) = gaussian_log_scale_term(n as f64, rss, log_sigma);
        let mut logp = lik;
        grad[2 * k + 1] += dlik;

        // Dirichlet(1) on the gap shares, including the softmax Jacobian.
        logp += log_shares.iter().sum::<f64>();
        let weighted_total: f64 = boundary_slopes
            .iter()
            .zip(&cumulative)
            .map(|(slope, cum)| slope * cum)
            .sum();
        let mut suffix = 0.0;
        for l in (0..k).rev() {
            suffix += boundary_slopes[l];
            grad[l] += self.map.free() * shares[l] * (suffix - weighted_total);
            grad[l] += 1.0 - (k + 1) as f64 * shares[l];
        }

        for (j, &level) in levels.iter().enumerate() {
            let (lp, dlp) = normal_prior(level, self.priors.level_loc, self.priors.level_scale);
            logp += lp;
            grad[k + j] += dlp;
        }

        let (lp, dlp) = half_normal_log_scale_prior(log_sigma, self.priors.noise_scale);
        logp += lp;
        grad[2 * k + 1] += dlp;

        if logp.is_finite() {
            logp
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Random starting point: positions uniform over feasible placements,
    /// levels and noise drawn around the standardized scale.
    pub fn initial_theta<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let k = self.k();
        let free = self.map.free() as usize;
        let mut spares = (0..k)
            .map(|_| rng.random_range(0..=free))
            .collect::<Vec<_>>();
        spares.sort_unstable();
        let positions = spares
            .iter()
            .enumerate()
            .map(|(slot, spare)| (slot + 1) * self.min_dist() + spare)
            .collect::<Vec<_>>();

        let mut theta = self
            .map
            .latents_for(&positions)
            .unwrap_or_else(|| vec![0.0; k]);
        theta.extend((0..=k).map(|_| rng.random_range(-2.0..2.0)));
        theta.push(rng.random_range(-1.5..0.5));
        theta
    }

    pub fn draw(&self, theta: &[f64], log_density: f64) -> Draw {
        let k = self.k();
        let positions = self.map.positions(&theta[..k]);
        let means = theta[k..2 * k + 1]
            .iter()
            .map(|&m| self.scaling.level(m))
            .collect();
        Draw {
            positions,
            segments: SegmentParams::MeanShift {
                means,
                sigma: self.scaling.spread(theta[2 * k + 1].exp()),
            },
            log_density,
        }
    }
}
