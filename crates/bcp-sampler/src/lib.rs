// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod adaptation;
pub mod chain;
pub mod config;
pub mod hmc;
pub mod metropolis;

pub use chain::ChainStats;
pub use config::SamplerConfig;

use bcp_core::{BcpError, ExecutionContext, LogLevel};
#[cfg(feature = "rayon")]
use bcp_core::ReproMode;
use bcp_model::{Model, PosteriorSampleSet};
use chain::{ChainOutput, Progress, run_chain};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::time::Instant;

/// Output of a sampler run.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerRun {
    pub samples: PosteriorSampleSet,
    /// One entry per chain, in chain order.
    pub chain_stats: Vec<ChainStats>,
    /// True when the run succeeded on the conservative retry.
    pub retried: bool,
    /// Configuration of the attempt that produced `samples`.
    pub config: SamplerConfig,
    pub runtime_ms: u64,
}

/// Draws posterior samples from `model`.
pub fn sample(
    model: &Model,
    config: &SamplerConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<PosteriorSampleSet, BcpError> {
    run(model, config, ctx).map(|run| run.samples)
}

/// Like [`sample`], keeping per-chain statistics.
pub fn run(
    model: &Model,
    config: &SamplerConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<SamplerRun, BcpError> {
    config.validate()?;
    let started_at = Instant::now();
    ctx.check_interrupted(started_at)?;

    let progress = Progress::new(config.chains * (config.tune + config.draws));
    let results = run_chains(model, config, ctx, started_at, &progress);

    if results
        .iter()
        .any(|result| matches!(result, Err(BcpError::Cancelled)))
    {
        ctx.log(LogLevel::Warn, "sampling cancelled; discarding all chains");
        return Err(BcpError::cancelled());
    }

    let mut outputs = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    if let Some(err) = first_error {
        for output in &outputs {
            ctx.log(LogLevel::Info, &describe(&output.stats));
        }
        ctx.log(LogLevel::Warn, &err.to_string());
        return Err(err);
    }

    let chain_stats: Vec<ChainStats> = outputs.iter().map(|output| output.stats.clone()).collect();
    let chains = outputs.into_iter().map(|output| output.draws).collect();
    let samples = PosteriorSampleSet::new(model.kind(), model.n(), chains)?;

    let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    let divergences: usize = chain_stats.iter().map(|stats| stats.divergences).sum();
    ctx.record_scalar("sampler.runtime_ms", runtime_ms as f64);
    ctx.record_scalar("sampler.divergences", divergences as f64);
    ctx.record_scalar(
        "sampler.mean_step_size",
        chain_stats.iter().map(|stats| stats.step_size).sum::<f64>() / chain_stats.len() as f64,
    );
    ctx.report_progress(1.0);
    tracing::info!(
        model = model.label(),
        chains = config.chains,
        draws = config.draws,
        divergences,
        runtime_ms,
        "sampling finished"
    );

    Ok(SamplerRun {
        samples,
        chain_stats,
        retried: false,
        config: config.clone(),
        runtime_ms,
    })
}

/// Runs [`run`], retrying once with [`SamplerConfig::conservative`] after a
/// divergence failure. The retry's error is surfaced if it fails too.
pub fn sample_with_retry(
    model: &Model,
    config: &SamplerConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<SamplerRun, BcpError> {
    match run(model, config, ctx) {
        Err(err) if err.is_retryable() => {
            let retry = config.conservative();
            ctx.log(
                LogLevel::Warn,
                &format!(
                    "{err}; retrying once with target_accept={:.3}",
                    retry.target_accept
                ),
            );
            let mut outcome = run(model, &retry, ctx)?;
            outcome.retried = true;
            Ok(outcome)
        }
        other => other,
    }
}

fn run_chains(
    model: &Model,
    config: &SamplerConfig,
    ctx: &ExecutionContext<'_>,
    started_at: Instant,
    progress: &Progress,
) -> Vec<Result<ChainOutput, BcpError>> {
    #[cfg(feature = "rayon")]
    if can_use_parallel(ctx) {
        return (0..config.chains)
            .into_par_iter()
            .map(|chain| run_chain(model, config, chain, ctx, started_at, progress))
            .collect();
    }

    (0..config.chains)
        .map(|chain| run_chain(model, config, chain, ctx, started_at, progress))
        .collect()
}

#[cfg(feature = "rayon")]
fn can_use_parallel(ctx: &ExecutionContext<'_>) -> bool {
    ctx.repro_mode != ReproMode::Strict
}

/// Worker threads available to chain execution.
pub fn thread_count(ctx: &ExecutionContext<'_>) -> usize {
    #[cfg(feature = "rayon")]
    if can_use_parallel(ctx) {
        return rayon::current_num_threads();
    }
    let _ = ctx;
    1
}

fn describe(stats: &ChainStats) -> String {
    format!(
        "chain {} completed: step_size={:.4}, mean_accept={:.3}, divergences={}",
        stats.chain, stats.step_size, stats.mean_accept_prob, stats.divergences
    )
}

/// Sampler crate namespace.
pub fn crate_name() -> &'static str {
    let _ = (bcp_core::crate_name(), bcp_model::crate_name());
    "bcp-sampler"
}
