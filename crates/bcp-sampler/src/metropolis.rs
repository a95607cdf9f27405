// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Metropolis updates for the discrete change point and for mean-shift
//! placement latents.

use bcp_model::MeanShiftModel;
use bcp_model::prefix::SegmentMoments;
use rand::Rng;
use rand_distr::StandardNormal;
use std::ops::Range;

/// Probability of proposing a uniform redraw over the whole support.
const UNIFORM_REDRAW_PROB: f64 = 0.1;
const WIDTH_ADAPT_EVERY: usize = 50;
const WIDTH_RAISE_ABOVE: f64 = 0.5;
const WIDTH_LOWER_BELOW: f64 = 0.15;
const LATENT_TARGET_ACCEPT: f64 = 0.3;
const MIN_LOG_SCALE: f64 = -12.0;
const MAX_LOG_SCALE: f64 = 3.0;
/// Share of relocations that reinsert the slot anywhere instead of inside
/// the gap between its neighbours.
const REINSERT_PROB: f64 = 0.5;

/// Symmetric random walk over `[lower, upper]`: ±1..=width steps mixed
/// with uniform redraws. Out-of-support proposals are rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegerWalk {
    lower: usize,
    upper: usize,
    width: usize,
    window_proposals: usize,
    window_accepts: usize,
    total_proposals: usize,
    total_accepts: usize,
}

impl IntegerWalk {
    pub fn new(lower: usize, upper: usize) -> Self {
        let span = upper.saturating_sub(lower);
        Self {
            lower,
            upper,
            width: (span / 20).max(1),
            window_proposals: 0,
            window_accepts: 0,
            total_proposals: 0,
            total_accepts: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// One Metropolis update of `tau` under `log_density`.
    ///
    /// `current` is the log density at `tau`; returns the (possibly new)
    /// position and its log density.
    pub fn step<R, F>(&mut self, tau: usize, current: f64, log_density: F, rng: &mut R) -> (usize, f64)
    where
        R: Rng + ?Sized,
        F: Fn(usize) -> f64,
    {
        self.window_proposals += 1;
        self.total_proposals += 1;

        let proposal = if rng.random::<f64>() < UNIFORM_REDRAW_PROB {
            Some(rng.random_range(self.lower..=self.upper))
        } else {
            let offset = rng.random_range(1..=self.width);
            if rng.random::<bool>() {
                tau.checked_add(offset)
            } else {
                tau.checked_sub(offset)
            }
        };

        let Some(proposal) = proposal.filter(|p| (self.lower..=self.upper).contains(p)) else {
            return (tau, current);
        };

        let proposed = log_density(proposal);
        if accept(proposed - current, rng) {
            self.window_accepts += 1;
            self.total_accepts += 1;
            (proposal, proposed)
        } else {
            (tau, current)
        }
    }

    /// Widens or narrows the walk from the recent acceptance rate. Called
    /// once per tuning iteration.
    pub fn adapt(&mut self) {
        if self.window_proposals < WIDTH_ADAPT_EVERY {
            return;
        }
        let rate = self.window_accepts as f64 / self.window_proposals as f64;
        let span = (self.upper - self.lower).max(1);
        if rate > WIDTH_RAISE_ABOVE {
            self.width = (self.width * 2).min(span);
        } else if rate < WIDTH_LOWER_BELOW {
            self.width = (self.width / 2).max(1);
        }
        self.window_proposals = 0;
        self.window_accepts = 0;
    }

    pub fn reset_counts(&mut self) {
        self.total_proposals = 0;
        self.total_accepts = 0;
    }

    pub fn accept_rate(&self) -> Option<f64> {
        (self.total_proposals > 0).then(|| self.total_accepts as f64 / self.total_proposals as f64)
    }
}

/// Gaussian random walk on a block of coordinates with a Robbins-Monro
/// adapted scale.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockWalk {
    range: Range<usize>,
    log_scale: f64,
    adapt_steps: usize,
    proposals: usize,
    accepts: usize,
}

impl BlockWalk {
    pub fn new(range: Range<usize>) -> Self {
        Self {
            range,
            log_scale: (0.5f64).ln(),
            adapt_steps: 0,
            proposals: 0,
            accepts: 0,
        }
    }

    pub fn scale(&self) -> f64 {
        self.log_scale.exp()
    }

    /// One joint update of `theta[range]`; returns whether it was accepted.
    pub fn step<R, F>(&mut self, theta: &mut [f64], current: &mut f64, log_density: F, rng: &mut R) -> (bool, f64)
    where
        R: Rng + ?Sized,
        F: Fn(&[f64]) -> f64,
    {
        self.proposals += 1;
        let scale = self.scale();
        let mut proposal = theta.to_vec();
        for value in &mut proposal[self.range.clone()] {
            let z: f64 = rng.sample(StandardNormal);
            *value += scale * z;
        }

        let proposed = log_density(&proposal);
        let delta = proposed - *current;
        let accept_prob = if delta.is_finite() {
            delta.exp().min(1.0)
        } else {
            0.0
        };
        let accepted = rng.random::<f64>() < accept_prob;
        if accepted {
            theta.copy_from_slice(&proposal);
            *current = proposed;
            self.accepts += 1;
        }
        (accepted, accept_prob)
    }

    pub fn adapt(&mut self, accept_prob: f64) {
        self.adapt_steps += 1;
        let gain = 1.0 / (self.adapt_steps as f64).sqrt();
        self.log_scale = (self.log_scale + gain * (accept_prob - LATENT_TARGET_ACCEPT))
            .clamp(MIN_LOG_SCALE, MAX_LOG_SCALE);
    }

    pub fn reset_counts(&mut self) {
        self.proposals = 0;
        self.accepts = 0;
    }

    pub fn accept_rate(&self) -> Option<f64> {
        (self.proposals > 0).then(|| self.accepts as f64 / self.proposals as f64)
    }
}

/// Relocation of one mean-shift change point with a refresh of every
/// segment level.
///
/// Placement moves act on the spare offsets of
/// [`bcp_model::PositionMap::spares`], where the placement prior is flat:
/// either slot `i` is redrawn uniformly between its neighbours, or it is
/// removed and a uniform offset over `[0, free)` is inserted in order. Both
/// proposals are symmetric. Levels are then proposed from
/// `N(segment mean, sigma^2 / count)` under the new placement; the reverse
/// level density and the softmax Jacobian enter the acceptance ratio.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotRelocation {
    proposals: usize,
    accepts: usize,
}

impl SlotRelocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// One relocation of `theta` under `log_density`, whose value at
    /// `theta` is `current`. Returns whether the move was accepted.
    pub fn step<R, F>(
        &mut self,
        model: &MeanShiftModel,
        theta: &mut [f64],
        current: &mut f64,
        log_density: F,
        rng: &mut R,
    ) -> bool
    where
        R: Rng + ?Sized,
        F: Fn(&[f64]) -> f64,
    {
        let k = model.k();
        let map = model.position_map();
        let free = map.free();
        if k == 0 || free <= 0.0 || theta.len() != model.dim() {
            return false;
        }
        self.proposals += 1;

        let (latents, rest) = theta.split_at(k);
        let (levels, tail) = rest.split_at(k + 1);
        let log_sigma = tail[0];
        let sigma = log_sigma.exp();

        let mut spares = map.spares(latents);
        let slot = rng.random_range(0..k);
        if rng.random::<f64>() < REINSERT_PROB {
            spares.remove(slot);
            let spare = rng.random_range(0.0..free);
            let at = spares.partition_point(|&other| other < spare);
            spares.insert(at, spare);
        } else {
            let lower = if slot == 0 { 0.0 } else { spares[slot - 1] };
            let upper = spares.get(slot + 1).copied().unwrap_or(free);
            if upper.is_nan() || upper <= lower {
                return false;
            }
            spares[slot] = rng.random_range(lower..upper);
        }
        let Some(mut proposal) = map.latents_for_spares(&spares) else {
            return false;
        };

        let mut log_q_reverse = 0.0;
        for (moments, &level) in model.segment_moments(latents).iter().zip(levels) {
            let Some((loc, scale)) = level_proposal(moments, sigma) else {
                return false;
            };
            log_q_reverse += normal_log_kernel(level, loc, scale);
        }
        let mut log_q_forward = 0.0;
        for moments in model.segment_moments(&proposal[..k]) {
            let Some((loc, scale)) = level_proposal(&moments, sigma) else {
                return false;
            };
            let z: f64 = rng.sample(StandardNormal);
            let level = loc + scale * z;
            log_q_forward += normal_log_kernel(level, loc, scale);
            proposal.push(level);
        }
        proposal.push(log_sigma);

        let proposed = log_density(&proposal);
        let log_ratio = (proposed - placement_log_jacobian(model, &proposal[..k]))
            - (*current - placement_log_jacobian(model, latents))
            + log_q_reverse
            - log_q_forward;
        if !accept(log_ratio, rng) {
            return false;
        }
        theta.copy_from_slice(&proposal);
        *current = proposed;
        self.accepts += 1;
        true
    }

    pub fn reset_counts(&mut self) {
        self.proposals = 0;
        self.accepts = 0;
    }

    pub fn accept_rate(&self) -> Option<f64> {
        (self.proposals > 0).then(|| self.accepts as f64 / self.proposals as f64)
    }
}

/// `log |d shares / d latents|`, which the mean-shift density carries.
fn placement_log_jacobian(model: &MeanShiftModel, latents: &[f64]) -> f64 {
    model.position_map().log_shares(latents).iter().sum()
}

fn level_proposal(moments: &SegmentMoments, sigma: f64) -> Option<(f64, f64)> {
    (moments.count >= 1.0 && sigma.is_finite() && sigma > 0.0)
        .then(|| (moments.sum / moments.count, sigma / moments.count.sqrt()))
}

fn normal_log_kernel(x: f64, loc: f64, scale: f64) -> f64 {
    let z = (x - loc) / scale;
    -0.5 * z * z - scale.ln()
}

fn accept<R: Rng + ?Sized>(log_ratio: f64, rng: &mut R) -> bool {
    if log_ratio.is_nan() {
        return false;
    }
    log_ratio >= 0.0 || rng.random::<f64>().ln() < log_ratio
}
