// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Static-trajectory Hamiltonian Monte Carlo with a diagonal metric.

use bcp_model::LogDensity;
use rand::Rng;
use rand_distr::StandardNormal;

/// Energy error beyond which a transition counts as divergent.
pub const DIVERGENCE_THRESHOLD: f64 = 1000.0;
const TRAJECTORY_JITTER: f64 = 0.5;
const MAX_STEP_SEARCH: usize = 100;
const MIN_STEP: f64 = 1e-10;
const MAX_STEP: f64 = 1e3;

/// Current position with its cached log density and gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct HmcState {
    pub theta: Vec<f64>,
    pub log_density: f64,
    pub grad: Vec<f64>,
}

impl HmcState {
    pub fn at<D: LogDensity + ?Sized>(density: &D, theta: Vec<f64>) -> Self {
        let mut grad = vec![0.0; theta.len()];
        let log_density = density.log_density_and_gradient(&theta, &mut grad);
        Self {
            theta,
            log_density,
            grad,
        }
    }

    /// Finite density and gradient.
    pub fn is_usable(&self) -> bool {
        self.log_density.is_finite() && self.grad.iter().all(|g| g.is_finite())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    /// Metropolis acceptance probability; zero for divergent trajectories.
    pub accept_prob: f64,
    pub accepted: bool,
    pub divergent: bool,
    pub leapfrog_steps: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HmcKernel {
    pub step_size: f64,
    /// Diagonal of the inverse mass matrix (posterior variance estimate).
    pub inv_metric: Vec<f64>,
    pub trajectory_length: f64,
    pub max_leapfrog: usize,
}

impl HmcKernel {
    pub fn new(dim: usize, step_size: f64, trajectory_length: f64, max_leapfrog: usize) -> Self {
        Self {
            step_size,
            inv_metric: vec![1.0; dim],
            trajectory_length,
            max_leapfrog,
        }
    }

    /// Leapfrog count for one transition, integration time jittered by ±50%.
    fn steps<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let jitter = 1.0 + TRAJECTORY_JITTER * (2.0 * rng.random::<f64>() - 1.0);
        let steps = (self.trajectory_length * jitter / self.step_size).ceil();
        if steps.is_finite() && steps >= 1.0 {
            (steps as usize).min(self.max_leapfrog)
        } else if steps.is_finite() {
            1
        } else {
            self.max_leapfrog
        }
    }

    /// One HMC transition from `state`, updating it in place on acceptance.
    pub fn transition<D, R>(&self, density: &D, state: &mut HmcState, rng: &mut R) -> Transition
    where
        D: LogDensity + ?Sized,
        R: Rng + ?Sized,
    {
        let n_steps = self.steps(rng);
        let mut momentum = sample_momentum(&self.inv_metric, rng);
        let initial_energy = -state.log_density + kinetic(&momentum, &self.inv_metric);

        let mut theta = state.theta.clone();
        let mut grad = state.grad.clone();
        let mut log_density = state.log_density;
        let mut divergent = false;
        let mut leapfrog_steps = 0;
        for _ in 0..n_steps {
            log_density = leapfrog(
                density,
                &mut theta,
                &mut momentum,
                &mut grad,
                self.step_size,
                &self.inv_metric,
            );
            leapfrog_steps += 1;
            if !log_density.is_finite() {
                divergent = true;
                break;
            }
        }

        let energy_error = -log_density + kinetic(&momentum, &self.inv_metric) - initial_energy;
        if !energy_error.is_finite() || energy_error > DIVERGENCE_THRESHOLD {
            divergent = true;
        }
        let accept_prob = if divergent {
            0.0
        } else {
            (-energy_error).exp().min(1.0)
        };

        let accepted = rng.random::<f64>() < accept_prob;
        if accepted {
            state.theta = theta;
            state.grad = grad;
            state.log_density = log_density;
        }

        Transition {
            accept_prob,
            accepted,
            divergent,
            leapfrog_steps,
        }
    }

    /// Doubles or halves the step size until one leapfrog step crosses an
    /// acceptance of one half.
    pub fn find_reasonable_step_size<D, R>(&self, density: &D, state: &HmcState, rng: &mut R) -> f64
    where
        D: LogDensity + ?Sized,
        R: Rng + ?Sized,
    {
        let mut step = self.step_size.clamp(MIN_STEP, MAX_STEP);
        let log_accept = |step: f64, rng: &mut R| -> f64 {
            let mut momentum = sample_momentum(&self.inv_metric, rng);
            let initial_energy = -state.log_density + kinetic(&momentum, &self.inv_metric);
            let mut theta = state.theta.clone();
            let mut grad = state.grad.clone();
            let log_density = leapfrog(
                density,
                &mut theta,
                &mut momentum,
                &mut grad,
                step,
                &self.inv_metric,
            );
            let delta = initial_energy - (-log_density + kinetic(&momentum, &self.inv_metric));
            if delta.is_finite() {
                delta
            } else {
                f64::NEG_INFINITY
            }
        };

        let half = 0.5f64.ln();
        let direction = if log_accept(step, rng) > half { 1.0 } else { -1.0 };
        for _ in 0..MAX_STEP_SEARCH {
            let next = (step * 2f64.powf(direction)).clamp(MIN_STEP, MAX_STEP);
            if next == step {
                break;
            }
            step = next;
            let crossed = if direction > 0.0 {
                log_accept(step, rng) <= half
            } else {
                log_accept(step, rng) >= half
            };
            if crossed {
                break;
            }
        }
        step
    }
}

fn sample_momentum<R: Rng + ?Sized>(inv_metric: &[f64], rng: &mut R) -> Vec<f64> {
    inv_metric
        .iter()
        .map(|inv| {
            let z: f64 = rng.sample(StandardNormal);
            z / inv.sqrt()
        })
        .collect()
}

fn kinetic(momentum: &[f64], inv_metric: &[f64]) -> f64 {
    0.5 * momentum
        .iter()
        .zip(inv_metric)
        .map(|(p, inv)| p * p * inv)
        .sum::<f64>()
}

/// One velocity-Verlet step; returns the new log density (non-finite means
/// the trajectory left the support and the caller must stop).
fn leapfrog<D: LogDensity + ?Sized>(
    density: &D,
    theta: &mut [f64],
    momentum: &mut [f64],
    grad: &mut [f64],
    step: f64,
    inv_metric: &[f64],
) -> f64 {
    for (p, g) in momentum.iter_mut().zip(grad.iter()) {
        *p += 0.5 * step * g;
    }
    for ((x, p), inv) in theta.iter_mut().zip(momentum.iter()).zip(inv_metric) {
        *x += step * inv * p;
    }
    let log_density = density.log_density_and_gradient(theta, grad);
    if !log_density.is_finite() {
        return log_density;
    }
    for (p, g) in momentum.iter_mut().zip(grad.iter()) {
        *p += 0.5 * step * g;
    }
    log_density
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{HmcKernel, HmcState};
    use bcp_model::LogDensity;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// Independent normals with given means and standard deviations.
    pub(crate) struct DiagonalNormal {
        pub(crate) means: Vec<f64>,
        pub(crate) sds: Vec<f64>,
    }

    impl LogDensity for DiagonalNormal {
        fn dim(&self) -> usize {
            self.means.len()
        }

        fn log_density_and_gradient(&self, theta: &[f64], grad: &mut [f64]) -> f64 {
            let mut logp = 0.0;
            for (i, &x) in theta.iter().enumerate() {
                let z = (x - self.means[i]) / self.sds[i];
                logp -= 0.5 * z * z;
                grad[i] = -z / self.sds[i];
            }
            logp
        }
    }

    #[test]
    fn recovers_moments_of_a_known_normal() {
        let target = DiagonalNormal {
            means: vec![1.0, -2.0],
            sds: vec![0.5, 3.0],
        };
        let mut kernel = HmcKernel::new(2, 0.4, 2.0, 64);
        kernel.inv_metric = vec![0.25, 9.0];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2024);
        let mut state = HmcState::at(&target, vec![0.0, 0.0]);

        let mut sums = [0.0; 2];
        let mut sums_sq = [0.0; 2];
        let draws = 4000;
        let mut accepted = 0;
        for _ in 0..draws {
            let transition = kernel.transition(&target, &mut state, &mut rng);
            assert!(!transition.divergent);
            accepted += usize::from(transition.accepted);
            for i in 0..2 {
                sums[i] += state.theta[i];
                sums_sq[i] += state.theta[i] * state.theta[i];
            }
        }

        assert!(accepted > draws * 8 / 10);
        for i in 0..2 {
            let mean = sums[i] / draws as f64;
            let var = sums_sq[i] / draws as f64 - mean * mean;
            let sd = target.sds[i];
            assert!(
                (mean - target.means[i]).abs() < 0.1 * sd,
                "mean[{i}]={mean}"
            );
            assert!((var / (sd * sd) - 1.0).abs() < 0.15, "var[{i}]={var}");
        }
    }

    #[test]
    fn huge_steps_are_flagged_divergent() {
        let target = DiagonalNormal {
            means: vec![0.0],
            sds: vec![1e-3],
        };
        let kernel = HmcKernel::new(1, 50.0, 100.0, 4);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut state = HmcState::at(&target, vec![0.0]);
        let transition = kernel.transition(&target, &mut state, &mut rng);
        assert!(transition.divergent);
        assert_eq!(transition.accept_prob, 0.0);
        assert!(!transition.accepted);
        assert_eq!(state.theta, vec![0.0]);
    }

    #[test]
    fn reasonable_step_size_scales_with_target_width() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let narrow = DiagonalNormal {
            means: vec![0.0],
            sds: vec![0.01],
        };
        let wide = DiagonalNormal {
            means: vec![0.0],
            sds: vec![10.0],
        };
        let kernel = HmcKernel::new(1, 1.0, 1.0, 10);
        let narrow_step = kernel.find_reasonable_step_size(
            &narrow,
            &HmcState::at(&narrow, vec![0.0]),
            &mut rng,
        );
        let wide_step =
            kernel.find_reasonable_step_size(&wide, &HmcState::at(&wide, vec![0.0]), &mut rng);
        assert!(narrow_step < 0.1, "narrow step {narrow_step}");
        assert!(wide_step > 1.0, "wide step {wide_step}");
    }
}
