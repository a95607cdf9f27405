// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, TimeSeries};
use chrono::NaiveDate;

/// Deterministic step series: level 0 before `n / 2`, level 3 after, with
/// bounded pseudo-noise.
pub fn step_series(n: usize) -> Result<TimeSeries, BcpError> {
    let mut state = 0x5eed_cafe_f00d_beef_u64;
    let values = (0..n)
        .map(|t| {
            let level = if t < n / 2 { 0.0 } else { 3.0 };
            level + lcg_unit(&mut state) - 0.5
        })
        .collect();
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
    TimeSeries::daily(start, values)
}

fn lcg_unit(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*state >> 11) as f64 / (1u64 << 53) as f64
}

/// Benchmark namespace.
pub fn crate_name() -> &'static str {
    let _ = (
        bcp_core::crate_name(),
        bcp_eval::crate_name(),
        bcp_model::crate_name(),
        bcp_sampler::crate_name(),
    );
    "bcp-bench"
}
