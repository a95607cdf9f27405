// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BcpError;
use crate::control::CancelToken;
use crate::observability::{LogLevel, LogSink, ProgressSink, TelemetrySink};
use crate::repro::ReproMode;
use std::time::Instant;

/// Per-run context passed through the sampler and pipeline.
///
/// Holds cancellation, the optional wall-clock budget, the reproducibility
/// mode and optional observability sinks. Nothing here is process-global.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub time_budget_ms: Option<u64>,
    pub repro_mode: ReproMode,
    pub progress: Option<&'a dyn ProgressSink>,
    pub telemetry: Option<&'a dyn TelemetrySink>,
    pub log: Option<&'a dyn LogSink>,
}

impl Default for ExecutionContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context with no budget and no optional hooks.
    pub fn new() -> Self {
        Self {
            cancel: None,
            time_budget_ms: None,
            repro_mode: ReproMode::Balanced,
            progress: None,
            telemetry: None,
            log: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Sets the wall-clock budget; exceeding it aborts like a cancellation.
    pub fn with_time_budget_ms(mut self, time_budget_ms: u64) -> Self {
        self.time_budget_ms = Some(time_budget_ms);
        self
    }

    pub fn with_repro_mode(mut self, repro_mode: ReproMode) -> Self {
        self.repro_mode = repro_mode;
        self
    }

    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_telemetry_sink(mut self, telemetry: &'a dyn TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_log_sink(mut self, log: &'a dyn LogSink) -> Self {
        self.log = Some(log);
        self
    }

    /// Returns true when cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Returns a cancelled error when cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<(), BcpError> {
        if self.is_cancelled() {
            return Err(BcpError::cancelled());
        }
        Ok(())
    }


    /// Fails with the cancelled error once the elapsed time exceeds the budget.
    pub fn check_time_budget(&self, started_at: Instant) -> Result<(), BcpError> {
        let Some(limit_ms) = self.time_budget_ms else {
            return Ok(());
        };

        let elapsed_ms = started_at.elapsed().as_millis();
        if elapsed_ms <= u128::from(limit_ms) {
            return Ok(());
        }

        tracing::debug!(elapsed_ms, limit_ms, "time budget exhausted");
        Err(BcpError::cancelled())
    }

    /// Cancellation and time budget together; the check run between iterations.
    pub fn check_interrupted(&self, started_at: Instant) -> Result<(), BcpError> {
        self.check_cancelled()?;
        self.check_time_budget(started_at)
    }

    /// [`Self::check_interrupted`] on every `every`-th iteration.
    ///
    /// When `every` is zero, it is treated as one (always poll).
    pub fn check_interrupted_every(
        &self,
        iteration: usize,
        every: usize,
        started_at: Instant,
    ) -> Result<(), BcpError> {
        let every = every.max(1);
        if iteration % every != 0 {
            return Ok(());
        }
        self.check_interrupted(started_at)
    }

    /// Emits clamped progress to the sink, if configured.
    pub fn report_progress(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }

        if let Some(sink) = self.progress {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }

    /// Emits a scalar telemetry value to the sink, if configured.
    pub fn record_scalar(&self, key: &'static str, value: f64) {
        if let Some(sink) = self.telemetry {
            sink.record_scalar(key, value);
        }
    }

    /// Writes to the run log, if configured, and mirrors the line as a
    /// `tracing` event.
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
        }
        if let Some(sink) = self.log {
            sink.log(level, message);
        }
    }
}
