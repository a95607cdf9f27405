// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Map from unconstrained latents to ordered, spaced change-point positions.
//!
//! `k` latents `u` plus an implicit `u_k = 0` define shares
//! `p = softmax(u, 0)` over `k + 1` gaps. With `free = n - (k + 1) * min_dist`
//! spare points, boundary `i` sits at
//! `c_i = (i + 1) * min_dist + free * P_i` where `P_i = p_0 + .. + p_i`.
//! Reported positions round the spare part half-to-even, so every position
//! lies in `[min_dist, n - min_dist]` and consecutive positions differ by at
//! least `min_dist`.

use bcp_core::numeric::round_half_even_index;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionMap {
    n: usize,
    k: usize,
    min_dist: usize,
    free: f64,
}

impl PositionMap {
    /// Requires `(k + 1) * min_dist <= n`; the builder checks feasibility first.
    pub fn new(n: usize, k: usize, min_dist: usize) -> Self {
        let reserved = (k + 1).saturating_mul(min_dist);
        Self {
            n,
            k,
            min_dist,
            free: n.saturating_sub(reserved) as f64,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn min_dist(&self) -> usize {
        self.min_dist
    }

    /// Spare points distributed over the gaps.
    pub fn free(&self) -> f64 {
        self.free
    }

    /// `softmax(u, 0)`, length `k + 1`.
    pub fn shares(&self, latents: &[f64]) -> Vec<f64> {
        let max = latents.iter().copied().fold(0.0_f64, f64::max);
        let mut shares = latents
            .iter()
            .map(|u| (u - max).exp())
            .chain(std::iter::once((-max).exp()))
            .collect::<Vec<_>>();
        let total: f64 = shares.iter().sum();
        shares.iter_mut().for_each(|share| *share /= total);
        shares
    }

    /// `log softmax(u, 0)`, length `k + 1`.
    pub fn log_shares(&self, latents: &[f64]) -> Vec<f64> {
        let max = latents.iter().copied().fold(0.0_f64, f64::max);
        let total = latents
            .iter()
            .map(|u| (u - max).exp())
            .sum::<f64>()
            + (-max).exp();
        let log_norm = max + total.ln();
        latents
            .iter()
            .map(|u| u - log_norm)
            .chain(std::iter::once(-log_norm))
            .collect()
    }

    /// Cumulative shares `P_0..P_{k-1}` from shares of length `k + 1`.
    pub fn cumulative(&self, shares: &[f64]) -> Vec<f64> {
        shares
            .iter()
            .take(self.k)
            .scan(0.0, |acc, share| {
                *acc += share;
                Some((*acc).min(1.0))
            })
            .collect()
    }

    /// Continuous boundary for slot `slot` given its cumulative share.
    pub fn boundary(&self, slot: usize, cumulative: f64) -> f64 {
        ((slot + 1) * self.min_dist) as f64 + self.free * cumulative
    }

    /// Continuous boundaries `c_0..c_{k-1}`.
    pub fn boundaries(&self, latents: &[f64]) -> Vec<f64> {
        let shares = self.shares(latents);
        self.cumulative(&shares)
            .into_iter()
            .enumerate()
            .map(|(slot, cumulative)| self.boundary(slot, cumulative))
            .collect()
    }

    /// Spare offsets `free * P_i` of each boundary past its reserved
    /// `min_dist` blocks. The Dirichlet(1) placement prior is flat in these.
    pub fn spares(&self, latents: &[f64]) -> Vec<f64> {
        let shares = self.shares(latents);
        self.cumulative(&shares)
            .into_iter()
            .map(|cumulative| self.free * cumulative)
            .collect()
    }

    /// Latents whose [`Self::spares`] are `spares`. Requires strictly
    /// increasing offsets inside `(0, free)`.
    pub fn latents_for_spares(&self, spares: &[f64]) -> Option<Vec<f64>> {
        if spares.len() != self.k || self.free <= 0.0 {
            return None;
        }
        let mut log_gaps = Vec::with_capacity(self.k + 1);
        let mut previous = 0.0;
        for &spare in spares.iter().chain(std::iter::once(&self.free)) {
            let gap = spare - previous;
            if gap.is_nan() || gap <= 0.0 {
                return None;
            }
            log_gaps.push(gap.ln());
            previous = spare;
        }
        let last = log_gaps[self.k];
        Some(log_gaps[..self.k].iter().map(|log_gap| log_gap - last).collect())
    }

    /// Discrete positions `tau_0..tau_{k-1}`.
    pub fn positions(&self, latents: &[f64]) -> Vec<usize> {
        let shares = self.shares(latents);
        let free_points = self.free as usize;
        self.cumulative(&shares)
            .into_iter()
            .enumerate()
            .map(|(slot, cumulative)| {
                let spare = round_half_even_index(self.free * cumulative)
                    .unwrap_or(0)
                    .min(free_points);
                (slot + 1) * self.min_dist + spare
            })
            .collect()
    }

    /// Latents whose positions are `positions`, when they satisfy the
    /// support and spacing rules. Used to seed chains at chosen placements.
    pub fn latents_for(&self, positions: &[usize]) -> Option<Vec<f64>> {
        if positions.len() != self.k || self.free <= 0.0 {
            return None;
        }
        let mut gaps = Vec::with_capacity(self.k + 1);
        let mut previous_spare = 0.0;
        for (slot, &position) in positions.iter().enumerate() {
            let spare = position.checked_sub((slot + 1) * self.min_dist)? as f64;
            if spare < previous_spare || spare > self.free {
                return None;
            }
            gaps.push(spare - previous_spare);
            previous_spare = spare;
        }
        gaps.push(self.free - previous_spare);

        // Small floor keeps zero gaps finite in log space without moving
        // any rounded position.
        let floor = 1.0e-3;
        let last = gaps[self.k] + floor;
        Some(
            gaps.iter()
                .take(self.k)
                .map(|gap| ((gap + floor) / last).ln())
                .collect(),
        )
    }
}
