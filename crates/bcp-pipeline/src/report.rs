// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

#[cfg(feature = "serde")]
use bcp_core::BcpError;
use bcp_core::RunDiagnostics;
use bcp_eval::ConvergenceReport;
use bcp_insight::{ChangePointEstimate, ImpactSummary, Insight, Reliability};
use bcp_preprocess::{AdfTest, SeriesSummary, Transform};
use bcp_sampler::ChainStats;
use chrono::NaiveDate;

/// Everything one analysis run produced.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisReport {
    /// Model label, e.g. `mean_shift`.
    pub model: String,
    pub transform: Transform,
    /// Summary of the series the model was fitted to.
    pub input: SeriesSummary,
    /// Unit-root test on the fitted series; `None` when it is too short.
    pub stationarity: Option<AdfTest>,
    pub estimates: Vec<ChangePointEstimate>,
    pub convergence: ConvergenceReport,
    pub impacts: Vec<ImpactSummary>,
    pub insights: Vec<Insight>,
    pub dropped: usize,
    pub merged: usize,
    pub chain_stats: Vec<ChainStats>,
    pub diagnostics: RunDiagnostics,
}

impl AnalysisReport {
    /// True when every estimate passed the convergence checks.
    pub fn is_reliable(&self) -> bool {
        self.estimates
            .iter()
            .all(|estimate| estimate.reliability == Reliability::Reliable)
    }

    pub fn change_point_dates(&self) -> Vec<NaiveDate> {
        self.estimates.iter().map(|estimate| estimate.date).collect()
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, BcpError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| BcpError::data(format!("cannot encode analysis report: {err}")))
    }

    #[cfg(feature = "serde")]
    pub fn to_json_value(&self) -> Result<serde_json::Value, BcpError> {
        serde_json::to_value(self)
            .map_err(|err| BcpError::data(format!("cannot encode analysis report: {err}")))
    }
}
