// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{AnalysisConfig, ModelChoice};
pub use pipeline::{AnalysisPipeline, analyze};
pub use report::AnalysisReport;

/// Parses a JSON analysis config and runs it.
#[cfg(feature = "serde")]
pub fn analyze_json(
    series: &bcp_core::TimeSeries,
    events: &[bcp_core::EventRecord],
    config_json: &str,
    ctx: &bcp_core::ExecutionContext<'_>,
) -> Result<AnalysisReport, bcp_core::BcpError> {
    let config = AnalysisConfig::from_json(config_json)?;
    AnalysisPipeline::new(config)?.run(series, events, ctx)
}

/// Pipeline namespace.
pub fn crate_name() -> &'static str {
    let _ = (
        bcp_core::crate_name(),
        bcp_eval::crate_name(),
        bcp_insight::crate_name(),
        bcp_model::crate_name(),
        bcp_preprocess::crate_name(),
        bcp_sampler::crate_name(),
    );
    "bcp-pipeline"
}

#[cfg(test)]
mod tests {
    use super::crate_name;

    #[test]
    fn crate_name_matches_expected() {
        assert_eq!(crate_name(), "bcp-pipeline");
    }
}
