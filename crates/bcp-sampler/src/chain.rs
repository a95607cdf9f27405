// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::adaptation::{DiagonalVariance, DualAveraging, WindowSchedule};
use crate::config::SamplerConfig;
use crate::hmc::{HmcKernel, HmcState};
use crate::metropolis::{BlockWalk, IntegerWalk, SlotRelocation};
use bcp_core::{BcpError, ExecutionContext, derive_chain_seed};
use bcp_model::{Draw, LogDensity, Model, Params};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Summary statistics of one finished chain.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ChainStats {
    pub chain: usize,
    pub seed: u64,
    pub init_attempts: usize,
    pub step_size: f64,
    /// Mean HMC acceptance probability over retained iterations.
    pub mean_accept_prob: f64,
    pub divergences: usize,
    pub leapfrog_steps: usize,
    pub tau_accept_rate: Option<f64>,
    pub tau_walk_width: Option<usize>,
    pub latent_accept_rate: Option<f64>,
    pub relocation_accept_rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ChainOutput {
    pub(crate) draws: Vec<Draw>,
    pub(crate) stats: ChainStats,
}

/// Shared progress counter across chains.
pub(crate) struct Progress {
    done: AtomicUsize,
    total: usize,
    every: usize,
}

impl Progress {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total: total.max(1),
            every: (total / 100).max(1),
        }
    }

    fn tick(&self, ctx: &ExecutionContext<'_>) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.every == 0 {
            ctx.report_progress(done as f32 / self.total as f32);
        }
    }
}

/// Runs chain `chain` to completion: initialization, `tune` adaptation
/// iterations, then `draws` retained iterations.
pub(crate) fn run_chain(
    model: &Model,
    config: &SamplerConfig,
    chain: usize,
    ctx: &ExecutionContext<'_>,
    started_at: Instant,
    progress: &Progress,
) -> Result<ChainOutput, BcpError> {
    let seed = derive_chain_seed(config.seed, chain);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let (mut params, mut state, init_attempts) = initialize(model, config, chain, &mut rng)?;

    let mut kernel = HmcKernel::new(
        model.dim(),
        1.0,
        config.trajectory_length,
        config.max_leapfrog,
    );
    kernel.step_size = kernel.find_reasonable_step_size(
        &model.conditional(params.tau),
        &state,
        &mut rng,
    );
    let mut step_adapter = DualAveraging::new(config.target_accept, kernel.step_size);
    let schedule = WindowSchedule::new(config.tune);
    let mut metric = DiagonalVariance::new(model.dim());

    let mut tau_walk = model
        .discrete_support()
        .map(|(lower, upper)| IntegerWalk::new(lower, upper));
    let latent_range = model.latent_range();
    let mut latent_walk = (!latent_range.is_empty()).then(|| BlockWalk::new(latent_range));
    let mean_shift = match model {
        Model::MeanShift(mean_shift) => Some(mean_shift),
        Model::TrendShift(_) | Model::VarianceShift(_) => None,
    };
    let mut relocation = mean_shift.map(|_| SlotRelocation::new());

    let total_iterations = config.tune + config.draws;
    let cancel_every = config.normalized_cancel_check_every();
    let mut draws = Vec::with_capacity(config.draws);
    let mut divergences = 0usize;
    let mut leapfrog_steps = 0usize;
    let mut accept_sum = 0.0;

    for iteration in 0..total_iterations {
        ctx.check_interrupted_every(iteration, cancel_every, started_at)?;
        let tuning = iteration < config.tune;
        if iteration == config.tune {
            if let Some(walk) = tau_walk.as_mut() {
                walk.reset_counts();
            }
            if let Some(walk) = latent_walk.as_mut() {
                walk.reset_counts();
            }
            if let Some(relocation) = relocation.as_mut() {
                relocation.reset_counts();
            }
        }

        if let (Some(walk), Some(tau)) = (tau_walk.as_mut(), params.tau) {
            let mut tau = tau;
            let mut current = state.log_density;
            for _ in 0..config.discrete_moves {
                (tau, current) = walk.step(
                    tau,
                    current,
                    |candidate| model.conditional(Some(candidate)).log_density(&state.theta),
                    &mut rng,
                );
                if tuning {
                    walk.adapt();
                }
            }
            params.tau = Some(tau);
            state = HmcState::at(&model.conditional(params.tau), state.theta);
        }

        if let (Some(relocation), Some(mean_shift)) = (relocation.as_mut(), mean_shift) {
            let density = model.conditional(params.tau);
            let mut current = state.log_density;
            let mut moved = false;
            for _ in 0..config.discrete_moves {
                moved |= relocation.step(
                    mean_shift,
                    &mut state.theta,
                    &mut current,
                    |theta| density.log_density(theta),
                    &mut rng,
                );
            }
            if moved {
                state = HmcState::at(&density, state.theta);
            }
        }

        if let Some(walk) = latent_walk.as_mut() {
            let density = model.conditional(params.tau);
            let mut current = state.log_density;
            let (accepted, accept_prob) = walk.step(
                &mut state.theta,
                &mut current,
                |theta| density.log_density(theta),
                &mut rng,
            );
            if tuning {
                walk.adapt(accept_prob);
            }
            if accepted {
                state = HmcState::at(&density, state.theta);
            }
        }

        let density = model.conditional(params.tau);
        let transition = kernel.transition(&density, &mut state, &mut rng);

        if tuning {
            kernel.step_size = step_adapter.update(transition.accept_prob);
            if iteration >= schedule.slow_start() {
                metric.push(&state.theta);
            }
            if schedule.is_window_end(iteration) {
                if let Some(variance) = metric.regularized() {
                    kernel.inv_metric = variance;
                    kernel.step_size = kernel.find_reasonable_step_size(&density, &state, &mut rng);
                    step_adapter.restart(kernel.step_size);
                }
                metric.reset();
            }
            if iteration + 1 == config.tune {
                kernel.step_size = step_adapter.final_step();
            }
        } else {
            divergences += usize::from(transition.divergent);
            leapfrog_steps += transition.leapfrog_steps;
            accept_sum += transition.accept_prob;
            params.theta.clone_from(&state.theta);
            draws.push(model.draw(&params, state.log_density));
        }

        progress.tick(ctx);
    }

    let max_divergences = (config.max_divergence_fraction * config.draws as f64).floor() as usize;
    if divergences > max_divergences {
        return Err(BcpError::sampling_divergence(format!(
            "chain {chain}: {divergences} of {} post-tuning transitions diverged (limit {:.0}%)",
            config.draws,
            config.max_divergence_fraction * 100.0
        )));
    }

    let stats = ChainStats {
        chain,
        seed,
        init_attempts,
        step_size: kernel.step_size,
        mean_accept_prob: accept_sum / config.draws as f64,
        divergences,
        leapfrog_steps,
        tau_accept_rate: tau_walk.as_ref().and_then(IntegerWalk::accept_rate),
        tau_walk_width: tau_walk.as_ref().map(IntegerWalk::width),
        latent_accept_rate: latent_walk.as_ref().and_then(BlockWalk::accept_rate),
        relocation_accept_rate: relocation.as_ref().and_then(SlotRelocation::accept_rate),
    };
    tracing::debug!(
        chain,
        step_size = stats.step_size,
        mean_accept_prob = stats.mean_accept_prob,
        divergences,
        "chain finished"
    );
    Ok(ChainOutput { draws, stats })
}

/// Draws random starting points until one has a finite density and gradient.
fn initialize(
    model: &Model,
    config: &SamplerConfig,
    chain: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<(Params, HmcState, usize), BcpError> {
    for attempt in 1..=config.max_init_attempts {
        let params = model.initial_params(rng);
        let state = HmcState::at(&model.conditional(params.tau), params.theta.clone());
        if state.is_usable() {
            return Ok((params, state, attempt));
        }
    }
    Err(BcpError::sampling_divergence(format!(
        "chain {chain}: no finite initial point after {} attempts",
        config.max_init_attempts
    )))
}
