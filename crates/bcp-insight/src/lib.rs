// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod associate;
pub mod extract;
pub mod impact;
pub mod insight;

pub use associate::associate;
pub use extract::{ChangePointEstimate, Extraction, Reliability, extract};
pub use impact::{ImpactMeasure, ImpactSummary, percent_change, quantify};
pub use insight::{ImpactRecord, Insight, InsightRecord, generate_insights};

/// Posterior summaries and insight records.
pub fn crate_name() -> &'static str {
    let _ = (
        bcp_core::crate_name(),
        bcp_eval::crate_name(),
        bcp_model::crate_name(),
    );
    "bcp-insight"
}
