// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_eval::{ess, rhat};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn chain_set() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..5, 2usize..60).prop_flat_map(|(chains, draws)| {
        prop::collection::vec(prop::collection::vec(-50.0f64..50.0, draws), chains)
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        failure_persistence: Some(Box::new(FileFailurePersistence::Off)),
        ..ProptestConfig::default()
    })]

    #[test]
    fn rhat_is_defined_and_non_negative(chains in chain_set()) {
        let r = rhat(&chains);
        prop_assert!(r.is_infinite() || r >= 0.0);
        prop_assert!(!r.is_nan());
    }

    #[test]
    fn rhat_is_invariant_under_affine_maps(
        chains in chain_set(),
        shift in -100.0f64..100.0,
        scale in 0.5f64..4.0,
    ) {
        let mapped = chains
            .iter()
            .map(|chain| chain.iter().map(|x| scale * x + shift).collect())
            .collect::<Vec<Vec<f64>>>();
        let (a, b) = (rhat(&chains), rhat(&mapped));
        if a.is_finite() && b.is_finite() {
            prop_assert!((a - b).abs() <= 1e-6 * a.max(1.0), "{a} vs {b}");
        }
    }

    #[test]
    fn ess_is_positive(chains in chain_set()) {
        let e = ess(&chains);
        prop_assert!(e > 0.0, "ess={e}");
        prop_assert!(e.is_finite());
    }
}
