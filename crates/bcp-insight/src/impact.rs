// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::extract::ChangePointEstimate;
use bcp_model::{PosteriorSampleSet, SegmentParams};

/// Quantity compared across a change point.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImpactMeasure {
    Mean,
    Slope,
    Variance,
}

impl ImpactMeasure {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Slope => "slope",
            Self::Variance => "variance",
        }
    }
}

/// Before/after comparison for one change-point slot.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ImpactSummary {
    pub slot: usize,
    pub measure: ImpactMeasure,
    pub before: f64,
    pub after: f64,
    /// `after - before`.
    pub difference: f64,
    #[cfg_attr(feature = "serde", serde(rename = "pct_change"))]
    pub percent_change: Option<f64>,
}

/// `(after - before) / |before| * 100`, or `None` when `before` is zero.
pub fn percent_change(before: f64, after: f64) -> Option<f64> {
    if before == 0.0 || !before.is_finite() || !after.is_finite() {
        return None;
    }
    Some((after - before) / before.abs() * 100.0)
}

/// One summary per estimate, averaging segment parameters over all draws.
pub fn quantify(
    samples: &PosteriorSampleSet,
    estimates: &[ChangePointEstimate],
) -> Vec<ImpactSummary> {
    estimates
        .iter()
        .filter_map(|estimate| summarize(samples, estimate.slot))
        .collect()
}

fn summarize(samples: &PosteriorSampleSet, slot: usize) -> Option<ImpactSummary> {
    let mut measure = None;
    let mut before = 0.0;
    let mut after = 0.0;
    let mut count = 0usize;

    for draw in samples.iter_draws() {
        let (kind, b, a) = match &draw.segments {
            SegmentParams::MeanShift { means, .. } => {
                (ImpactMeasure::Mean, *means.get(slot)?, *means.get(slot + 1)?)
            }
            SegmentParams::TrendShift { slopes, .. } => (ImpactMeasure::Slope, slopes[0], slopes[1]),
            SegmentParams::VarianceShift { sigmas, .. } => {
                (ImpactMeasure::Variance, sigmas[0].powi(2), sigmas[1].powi(2))
            }
        };
        measure = Some(kind);
        before += b;
        after += a;
        count += 1;
    }

    let measure = measure?;
    let before = before / count as f64;
    let after = after / count as f64;
    Some(ImpactSummary {
        slot,
        measure,
        before,
        after,
        difference: after - before,
        percent_change: percent_change(before, after),
    })
}

#[cfg(test)]
mod tests {
    use super::{ImpactMeasure, percent_change, quantify};
    use crate::extract::extract;
    use crate::fixtures::{flat_series, mean_shift_samples};
    use bcp_model::{ChangePointKind, Draw, PosteriorSampleSet, SegmentParams};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn percent_change_handles_zero_and_sign() {
        assert_eq!(percent_change(0.0, 5.0), None);
        assert_eq!(percent_change(-0.0, 5.0), None);
        assert_close(percent_change(2.0, 3.0).expect("defined"), 50.0);
        // Relative to |before| so a rise from a negative level stays positive.
        assert_close(percent_change(-2.0, -1.0).expect("defined"), 50.0);
    }

    #[test]
    fn mean_shift_compares_adjacent_segments() {
        let samples = mean_shift_samples(
            100,
            10,
            &[vec![30, 60], vec![31, 61]],
            &[10.0, 15.0, 0.0],
        );
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        let impacts = quantify(&samples, &extraction.estimates);
        assert_eq!(impacts.len(), 2);

        assert_eq!(impacts[0].measure, ImpactMeasure::Mean);
        assert_close(impacts[0].before, 10.0);
        assert_close(impacts[0].after, 15.0);
        assert_close(impacts[0].difference, 5.0);
        assert_close(impacts[0].percent_change.expect("defined"), 50.0);

        assert_eq!(impacts[1].slot, 1);
        assert_close(impacts[1].after, 0.0);
        assert_close(impacts[1].percent_change.expect("defined"), -100.0);
    }

    #[test]
    fn zero_baseline_has_no_percent_change() {
        let samples = mean_shift_samples(100, 5, &[vec![50]], &[0.0, 3.0]);
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        let impacts = quantify(&samples, &extraction.estimates);
        assert_eq!(impacts[0].percent_change, None);
        assert_close(impacts[0].difference, 3.0);
    }

    fn single(segments: Vec<SegmentParams>) -> PosteriorSampleSet {
        let draws = segments
            .into_iter()
            .map(|segments| Draw {
                positions: vec![40],
                segments,
                log_density: 0.0,
            })
            .collect();
        PosteriorSampleSet::new(ChangePointKind::Single { lower: 10, upper: 90 }, 100, vec![draws])
            .expect("valid samples")
    }

    #[test]
    fn trend_shift_compares_slopes() {
        let samples = single(vec![
            SegmentParams::TrendShift {
                slopes: [1.0, -1.0],
                intercepts: [0.0, 80.0],
                sigma: 1.0,
            },
            SegmentParams::TrendShift {
                slopes: [3.0, -3.0],
                intercepts: [0.0, 80.0],
                sigma: 1.0,
            },
        ]);
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        let impact = &quantify(&samples, &extraction.estimates)[0];
        assert_eq!(impact.measure, ImpactMeasure::Slope);
        assert_close(impact.before, 2.0);
        assert_close(impact.after, -2.0);
        assert_close(impact.difference, -4.0);
        assert_close(impact.percent_change.expect("defined"), -200.0);
    }

    #[test]
    fn variance_shift_averages_squared_scales() {
        let samples = single(vec![
            SegmentParams::VarianceShift {
                mean: 0.0,
                sigmas: [1.0, 2.0],
            },
            SegmentParams::VarianceShift {
                mean: 0.0,
                sigmas: [3.0, 4.0],
            },
        ]);
        let extraction = extract(&samples, &flat_series(100)).expect("extraction");
        let impact = &quantify(&samples, &extraction.estimates)[0];
        assert_eq!(impact.measure, ImpactMeasure::Variance);
        // E[sigma^2], not E[sigma]^2.
        assert_close(impact.before, 5.0);
        assert_close(impact.after, 10.0);
        assert_close(impact.percent_change.expect("defined"), 100.0);
    }
}
