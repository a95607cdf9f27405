// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{ExecutionContext, TimeSeries};
use bcp_model::{ChangePointModelSpec, SegmentParams, build};
use bcp_sampler::{SamplerConfig, sample};
use chrono::NaiveDate;
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

// Each case runs a short chain, so the floor sits well below the
// density-level suites.
const MIN_PROPTEST_CASES: u32 = 64;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn series(values: Vec<f64>) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).expect("valid start date");
    TimeSeries::daily(start, values).expect("generated series should be valid")
}

/// Series long enough for `(k, min_dist)`, with a level shift somewhere.
fn mean_shift_case() -> impl Strategy<Value = (Vec<f64>, usize, usize, u64)> {
    (1usize..4, 2usize..8).prop_flat_map(|(k, min_dist)| {
        let floor = (2 * min_dist * k + 1).max(30);
        (
            prop::collection::vec(-3.0f64..3.0, floor..floor + 60),
            Just(k),
            Just(min_dist),
            any::<u64>(),
            0.0f64..8.0,
        )
            .prop_map(|(mut values, k, min_dist, seed, jump)| {
                let half = values.len() / 2;
                values[half..].iter_mut().for_each(|value| *value += jump);
                (values, k, min_dist, seed)
            })
    })
}

fn short_config(seed: u64) -> SamplerConfig {
    SamplerConfig {
        chains: 2,
        draws: 15,
        tune: 15,
        seed,
        max_divergence_fraction: 1.0,
        ..SamplerConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        failure_persistence: Some(Box::new(FileFailurePersistence::Off)),
        ..ProptestConfig::default()
    })]

    #[test]
    fn mean_shift_draws_respect_placement_rules((values, k, min_dist, seed) in mean_shift_case()) {
        let n = values.len();
        let model = build(&series(values), &ChangePointModelSpec::mean_shift(k, min_dist))
            .expect("generated layout is feasible");
        let samples = sample(&model, &short_config(seed), &ExecutionContext::new())
            .expect("short run should succeed");

        prop_assert_eq!(samples.num_chains(), 2);
        prop_assert_eq!(samples.draws_per_chain(), 15);
        for draw in samples.iter_draws() {
            prop_assert_eq!(draw.positions.len(), k);
            prop_assert!(draw.positions[0] >= min_dist, "{:?}", draw.positions);
            prop_assert!(draw.positions[k - 1] <= n - min_dist, "{:?}", draw.positions);
            for pair in draw.positions.windows(2) {
                prop_assert!(pair[1] >= pair[0] + min_dist, "{:?}", draw.positions);
            }
            prop_assert!(draw.log_density.is_finite());
            match &draw.segments {
                SegmentParams::MeanShift { means, sigma } => {
                    prop_assert_eq!(means.len(), k + 1);
                    prop_assert!(means.iter().all(|mean| mean.is_finite()));
                    prop_assert!(sigma.is_finite() && *sigma > 0.0);
                }
                other => prop_assert!(false, "unexpected segments {:?}", other),
            }
        }
    }

    #[test]
    fn variance_shift_draws_stay_inside_the_edge_margin(
        values in prop::collection::vec(-3.0f64..3.0, 30..120),
        seed in any::<u64>(),
    ) {
        let n = values.len();
        let model = build(&series(values), &ChangePointModelSpec::variance_shift())
            .expect("series is long enough");
        let samples = sample(&model, &short_config(seed), &ExecutionContext::new())
            .expect("short run should succeed");

        for draw in samples.iter_draws() {
            prop_assert_eq!(draw.positions.len(), 1);
            prop_assert!((10..=n - 10).contains(&draw.positions[0]), "{:?}", draw.positions);
        }
    }
}
