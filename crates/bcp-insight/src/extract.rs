// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::numeric::{mean, median, mode_smallest, quantile_sorted, round_half_even_index};
use bcp_core::{BcpError, TimeSeries};
use bcp_eval::ConvergenceReport;
use bcp_model::PosteriorSampleSet;
use chrono::NaiveDate;

const CREDIBLE_LOW: f64 = 0.025;
const CREDIBLE_HIGH: f64 = 0.975;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Reliability {
    #[default]
    Reliable,
    /// At least one convergence warning was raised for the run.
    Unreliable,
}

impl Reliability {
    pub fn from_report(report: &ConvergenceReport) -> Self {
        if report.warnings.is_empty() {
            Self::Reliable
        } else {
            Self::Unreliable
        }
    }
}

/// Point estimate of one change point.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ChangePointEstimate {
    /// Sampler slot the estimate summarizes.
    pub slot: usize,
    pub date: NaiveDate,
    pub position: usize,
    /// Central 95% interval of the slot's position draws.
    pub credible_interval: (f64, f64),
    pub median: f64,
    pub reliability: Reliability,
}

/// Estimates plus the bookkeeping of positions that were not kept.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    /// Sorted by position.
    pub estimates: Vec<ChangePointEstimate>,
    /// Positions at or past the end of the series.
    pub dropped: usize,
    /// Positions within `min_dist` of a kept estimate.
    pub merged: usize,
}

impl Extraction {
    /// Labels every estimate with the reliability implied by `report`.
    pub fn with_convergence(mut self, report: &ConvergenceReport) -> Self {
        let reliability = Reliability::from_report(report);
        for estimate in &mut self.estimates {
            estimate.reliability = reliability;
        }
        self
    }

    pub fn positions(&self) -> Vec<usize> {
        self.estimates.iter().map(|estimate| estimate.position).collect()
    }
}

/// Reduces posterior draws to change-point estimates on `series`.
///
/// A single change point uses the posterior mode (ties to the smallest
/// position); several use per-slot posterior means rounded half to even.
pub fn extract(samples: &PosteriorSampleSet, series: &TimeSeries) -> Result<Extraction, BcpError> {
    if samples.n() != series.len() {
        return Err(BcpError::data(format!(
            "sample set covers n={} points but series has {}",
            samples.n(),
            series.len()
        )));
    }

    let kind = samples.kind();
    let slots = kind.slots();
    let mut candidates = Vec::with_capacity(slots);
    for slot in 0..slots {
        let draws = samples.slot_positions(slot);
        let position = if slots == 1 {
            mode_smallest(&draws)
        } else {
            let as_f64 = draws.iter().map(|&p| p as f64).collect::<Vec<_>>();
            mean(&as_f64).and_then(round_half_even_index)
        };
        let Some(position) = position else {
            return Err(BcpError::data(format!("slot {slot} has no usable draws")));
        };
        candidates.push((slot, position));
    }

    let kept = reduce_candidates(candidates, series.len(), kind.min_separation());
    let mut extraction = Extraction {
        estimates: Vec::with_capacity(kept.slots.len()),
        dropped: kept.dropped,
        merged: kept.merged,
    };
    for (slot, position) in kept.slots {
        let Some(date) = series.date_at(position) else {
            extraction.dropped += 1;
            continue;
        };
        extraction
            .estimates
            .push(summarize_slot(samples, slot, position, date));
    }

    if extraction.dropped > 0 || extraction.merged > 0 {
        tracing::debug!(
            dropped = extraction.dropped,
            merged = extraction.merged,
            kept = extraction.estimates.len(),
            "change-point estimates reduced"
        );
    }
    Ok(extraction)
}

struct Reduced {
    slots: Vec<(usize, usize)>,
    dropped: usize,
    merged: usize,
}

/// Drops `(slot, position)` candidates past the series end and merges those
/// closer than `min_separation` to the previously kept one.
fn reduce_candidates(
    mut candidates: Vec<(usize, usize)>,
    n: usize,
    min_separation: usize,
) -> Reduced {
    candidates.sort_by_key(|&(slot, position)| (position, slot));
    let mut reduced = Reduced {
        slots: Vec::with_capacity(candidates.len()),
        dropped: 0,
        merged: 0,
    };
    for (slot, position) in candidates {
        if position >= n {
            reduced.dropped += 1;
            continue;
        }
        let too_close = reduced
            .slots
            .last()
            .is_some_and(|&(_, last)| position < last + min_separation);
        if too_close {
            reduced.merged += 1;
            continue;
        }
        reduced.slots.push((slot, position));
    }
    reduced
}

fn summarize_slot(
    samples: &PosteriorSampleSet,
    slot: usize,
    position: usize,
    date: NaiveDate,
) -> ChangePointEstimate {
    let mut draws = samples
        .slot_positions(slot)
        .into_iter()
        .map(|p| p as f64)
        .collect::<Vec<_>>();
    draws.sort_by(|a, b| a.total_cmp(b));
    let fallback = position as f64;
    ChangePointEstimate {
        slot,
        date,
        position,
        credible_interval: (
            quantile_sorted(&draws, CREDIBLE_LOW).unwrap_or(fallback),
            quantile_sorted(&draws, CREDIBLE_HIGH).unwrap_or(fallback),
        ),
        median: median(&draws).unwrap_or(fallback),
        reliability: Reliability::Reliable,
    }
}

#[cfg(test)]
mod tests {
    use super::{Reliability, extract, reduce_candidates};
    use crate::fixtures::{flat_series, mean_shift_samples, start};
    use bcp_eval::{ConvergenceReport, ConvergenceWarning, WarningIssue};
    use bcp_model::{ChangePointKind, Draw, PosteriorSampleSet, SegmentParams};
    use chrono::Days;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// `(n, min_dist, draws)` where every draw is a feasible ordered placement.
    fn ordered_draws() -> impl Strategy<Value = (usize, usize, Vec<Vec<usize>>)> {
        (1usize..5, 1usize..15)
            .prop_flat_map(|(k, min_dist)| {
                let floor = (k + 1) * min_dist;
                (Just(k), Just(min_dist), floor..floor + 200)
            })
            .prop_flat_map(|(k, min_dist, n)| {
                let free = n - (k + 1) * min_dist;
                let placements = prop::collection::vec(
                    prop::collection::vec(0..=free, k).prop_map(move |mut spares| {
                        spares.sort_unstable();
                        spares
                            .into_iter()
                            .enumerate()
                            .map(|(slot, spare)| (slot + 1) * min_dist + spare)
                            .collect::<Vec<_>>()
                    }),
                    1..30,
                );
                (Just(n), Just(min_dist), placements)
            })
    }

    proptest! {
        #[test]
        fn extracted_positions_are_ordered_spaced_and_accounted((n, min_dist, draws) in ordered_draws()) {
            let k = draws[0].len();
            let samples = mean_shift_samples(n, min_dist, &draws, &vec![0.0; k + 1]);
            let extraction = extract(&samples, &flat_series(n)).expect("valid samples extract");

            let positions = extraction.positions();
            prop_assert_eq!(extraction.estimates.len() + extraction.merged + extraction.dropped, k);
            prop_assert!(positions.iter().all(|&position| position < n), "{:?}", positions);
            for pair in positions.windows(2) {
                prop_assert!(pair[0] < pair[1], "{:?}", positions);
                prop_assert!(pair[1] - pair[0] >= min_dist, "{:?}", positions);
            }
            for estimate in &extraction.estimates {
                let (low, high) = estimate.credible_interval;
                prop_assert!(low <= estimate.median && estimate.median <= high);
                prop_assert_eq!(estimate.date, start() + Days::new(estimate.position as u64));
            }
        }
    }

    #[test]
    fn single_change_point_uses_mode_with_smallest_tie() {
        let positions = [40, 41, 41, 42, 42, 39]
            .into_iter()
            .map(|p| vec![p])
            .collect::<Vec<_>>();
        let samples = mean_shift_samples(100, 5, &positions, &[0.0, 1.0]);
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        assert_eq!(extraction.positions(), vec![41]);
        let estimate = &extraction.estimates[0];
        assert_eq!(estimate.date, start() + Days::new(41));
        assert_eq!(estimate.slot, 0);
        assert_eq!(estimate.median, 41.0);
        assert!(estimate.credible_interval.0 >= 39.0);
        assert!(estimate.credible_interval.1 <= 42.0);
        assert_eq!(estimate.reliability, Reliability::Reliable);
    }

    #[test]
    fn credible_interval_interpolates_percentiles() {
        let positions = (10..=50).map(|p| vec![p]).collect::<Vec<_>>();
        let samples = mean_shift_samples(100, 5, &positions, &[0.0, 1.0]);
        let estimate = extract(&samples, &flat_series(100)).expect("extraction").estimates[0].clone();
        // 41 draws: rank = q * 40.
        assert!((estimate.credible_interval.0 - 11.0).abs() < 1e-12);
        assert!((estimate.credible_interval.1 - 49.0).abs() < 1e-12);
    }

    #[test]
    fn multiple_change_points_use_rounded_means() {
        let positions = vec![vec![20, 60], vec![21, 61], vec![21, 62], vec![22, 62]];
        let samples = mean_shift_samples(100, 10, &positions, &[0.0, 1.0, 2.0]);
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        // Means 21.0 and 61.25.
        assert_eq!(extraction.positions(), vec![21, 61]);
        assert_eq!(extraction.merged, 0);
        assert_eq!(extraction.dropped, 0);
    }

    #[test]
    fn half_way_means_round_to_even() {
        let positions = vec![vec![20, 60], vec![21, 61]];
        let samples = mean_shift_samples(100, 10, &positions, &[0.0, 1.0, 2.0]);
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        // 20.5 -> 20 and 60.5 -> 60.
        assert_eq!(extraction.positions(), vec![20, 60]);
    }

    #[test]
    fn spaced_slot_means_are_all_kept() {
        let positions = vec![vec![20, 40], vec![50, 70], vec![35, 55]];
        let samples = mean_shift_samples(200, 20, &positions, &[0.0, 1.0, 2.0]);
        let extraction = extract(&samples, &flat_series(200)).expect("extraction");
        // Means 35 and 55 are exactly min_dist apart.
        assert_eq!(extraction.positions(), vec![35, 55]);
        assert_eq!(extraction.merged, 0);
    }

    #[test]
    fn reduce_merges_close_and_repeated_positions() {
        let reduced = reduce_candidates(vec![(2, 52), (0, 40), (1, 40), (3, 80)], 100, 20);
        assert_eq!(reduced.slots, vec![(0, 40), (3, 80)]);
        assert_eq!(reduced.merged, 2);
        assert_eq!(reduced.dropped, 0);
    }

    #[test]
    fn reduce_drops_positions_past_the_end() {
        let reduced = reduce_candidates(vec![(0, 30), (1, 100), (2, 130)], 100, 5);
        assert_eq!(reduced.slots, vec![(0, 30)]);
        assert_eq!(reduced.dropped, 2);
        assert_eq!(reduced.merged, 0);
    }

    #[test]
    fn series_length_must_match_samples() {
        let samples = mean_shift_samples(100, 5, &[vec![50]], &[0.0, 1.0]);
        let err = extract(&samples, &flat_series(99)).expect_err("length mismatch must fail");
        assert!(err.to_string().contains("n=100"));
    }

    #[test]
    fn single_variant_extracts_mode() {
        let draws = [30, 31, 31]
            .into_iter()
            .map(|tau| Draw {
                positions: vec![tau],
                segments: SegmentParams::VarianceShift {
                    mean: 0.0,
                    sigmas: [1.0, 2.0],
                },
                log_density: 0.0,
            })
            .collect();
        let samples = PosteriorSampleSet::new(
            ChangePointKind::Single { lower: 10, upper: 90 },
            100,
            vec![draws],
        )
        .expect("valid samples");
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        assert_eq!(extraction.positions(), vec![31]);
    }

    #[test]
    fn convergence_warnings_mark_estimates_unreliable() {
        let samples = mean_shift_samples(100, 5, &[vec![50]], &[0.0, 1.0]);
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        let report = ConvergenceReport {
            parameters: BTreeMap::new(),
            converged: false,
            warnings: vec![ConvergenceWarning {
                parameter: "tau[0]".to_string(),
                issue: WarningIssue::HighRhat,
                value: 1.4,
                threshold: 1.1,
            }],
        };
        let marked = extraction.with_convergence(&report);
        assert!(
            marked
                .estimates
                .iter()
                .all(|estimate| estimate.reliability == Reliability::Unreliable)
        );
    }
}
