// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::AnalysisConfig;
use crate::report::AnalysisReport;
use bcp_core::{BcpError, EventRecord, ExecutionContext, LogLevel, RunDiagnostics, TimeSeries};
use bcp_eval::diagnose;
use bcp_insight::{extract, generate_insights, quantify};
use bcp_preprocess::{SeriesSummary, adf_test, apply};
use bcp_sampler::sample_with_retry;
use std::borrow::Cow;
use std::time::Instant;

/// Validated analysis configuration, ready to run against series.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Result<Self, BcpError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Transforms `series`, samples the posterior, checks convergence and
    /// turns the estimates into insights against `events`.
    ///
    /// The configured repro mode and time budget override those of `ctx`.
    pub fn run(
        &self,
        series: &TimeSeries,
        events: &[EventRecord],
        ctx: &ExecutionContext<'_>,
    ) -> Result<AnalysisReport, BcpError> {
        let started_at = Instant::now();
        let mut ctx = ctx.with_repro_mode(self.config.repro_mode);
        if let Some(budget) = self.config.time_budget_ms {
            ctx = ctx.with_time_budget_ms(budget);
        }

        let transformed = apply(series, self.config.transform)?;
        let spec = self.config.model_spec();
        let model = bcp_model::build(&transformed.series, &spec)?;
        ctx.log(
            LogLevel::Info,
            &format!(
                "analysis started: model={}, n={}, transform={}",
                model.label(),
                model.n(),
                self.config.transform.as_str()
            ),
        );

        let stationarity = adf_test(transformed.series.values(), None);
        match &stationarity {
            Ok(test) => ctx.log(LogLevel::Info, &test.describe()),
            Err(err) => ctx.log(LogLevel::Warn, &format!("adf test skipped: {err}")),
        }

        let sampler_config = self.config.sampler_config();
        let sampled = sample_with_retry(&model, &sampler_config, &ctx)?;
        ctx.check_interrupted(started_at)?;

        let convergence = diagnose(&sampled.samples, &self.config.diagnose_config());
        if !convergence.converged {
            ctx.log(
                LogLevel::Warn,
                &format!(
                    "{} convergence warning(s); estimates marked unreliable",
                    convergence.warnings.len()
                ),
            );
        }

        let extraction =
            extract(&sampled.samples, &transformed.series)?.with_convergence(&convergence);
        let impacts = quantify(&sampled.samples, &extraction.estimates);
        let insights = generate_insights(&extraction.estimates, &impacts, events)?;
        for insight in &insights {
            ctx.log(LogLevel::Info, &insight.describe());
        }

        let mut notes = transformed
            .reports
            .iter()
            .flat_map(|report| {
                report
                    .notes
                    .iter()
                    .map(move |note| format!("{}: {note}", report.step))
            })
            .collect::<Vec<_>>();
        match &stationarity {
            Ok(test) => notes.push(test.describe()),
            Err(err) => notes.push(format!("adf test skipped: {err}")),
        }
        if sampled.retried {
            notes.push(format!(
                "sampler retried with target_accept={}",
                sampled.config.target_accept
            ));
        }
        if extraction.dropped > 0 || extraction.merged > 0 {
            notes.push(format!(
                "estimates: dropped={}, merged={}",
                extraction.dropped, extraction.merged
            ));
        }

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let diagnostics = RunDiagnostics {
            n: transformed.series.len(),
            runtime_ms: Some(runtime_ms),
            notes,
            warnings: convergence
                .warnings
                .iter()
                .map(ToString::to_string)
                .collect(),
            model: Cow::Borrowed(model.label()),
            seed: Some(sampled.config.seed),
            repro_mode: ctx.repro_mode,
            thread_count: Some(bcp_sampler::thread_count(&ctx)),
            chains: sampled.samples.num_chains(),
            draws_per_chain: sampled.samples.draws_per_chain(),
            retried: sampled.retried,
            #[cfg(feature = "serde")]
            params_json: serde_json::to_value(&self.config).ok(),
            ..RunDiagnostics::default()
        };

        ctx.record_scalar("pipeline.runtime_ms", runtime_ms as f64);
        ctx.record_scalar("pipeline.estimates", extraction.estimates.len() as f64);
        ctx.report_progress(1.0);
        tracing::info!(
            model = model.label(),
            estimates = extraction.estimates.len(),
            converged = convergence.converged,
            runtime_ms,
            "analysis finished"
        );

        Ok(AnalysisReport {
            model: model.label().to_string(),
            transform: self.config.transform,
            input: SeriesSummary::of(&transformed.series),
            stationarity: stationarity.ok(),
            estimates: extraction.estimates,
            convergence,
            impacts,
            insights,
            dropped: extraction.dropped,
            merged: extraction.merged,
            chain_stats: sampled.chain_stats,
            diagnostics,
        })
    }
}

/// Validates `config` and runs one analysis.
pub fn analyze(
    series: &TimeSeries,
    events: &[EventRecord],
    config: &AnalysisConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<AnalysisReport, BcpError> {
    AnalysisPipeline::new(config.clone())?.run(series, events, ctx)
}
