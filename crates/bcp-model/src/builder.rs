// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::mean_shift::MeanShiftModel;
use crate::model::Model;
use crate::spec::{ChangePointModelSpec, ModelVariant};
use crate::standardize::Standardization;
use crate::trend_shift::TrendShiftModel;
use crate::variance_shift::VarianceShiftModel;
use bcp_core::{BcpError, TimeSeries};

/// Edge margin of single-change-point variants: `tau in [10, n - 10]`.
pub const SINGLE_EDGE_MARGIN: usize = 10;

/// Shortest series any variant accepts.
const MIN_SERIES_LEN: usize = 10;

/// Validates `spec` against `series` and builds the model.
///
/// Check order: prior hyperparameters; then, for mean shifts, `k` and
/// `min_dist` non-zero and `k * min_dist < n`; then the series length floor
/// (a data error); then the edge buffer `n >= 2 * min_dist * k + 1`
/// (`n >= 21` for single-change-point variants).
pub fn build(series: &TimeSeries, spec: &ChangePointModelSpec) -> Result<Model, BcpError> {
    spec.priors.validate()?;
    let n = series.len();
    let values = series.values();

    let model = match spec.variant {
        ModelVariant::MeanShift { k, min_dist } => {
            if k == 0 || min_dist == 0 {
                return Err(BcpError::model_config(format!(
                    "mean shift needs k >= 1 and min_dist >= 1; got k={k}, min_dist={min_dist}"
                )));
            }
            if k.saturating_mul(min_dist) >= n {
                return Err(BcpError::model_config(format!(
                    "infeasible placement: k * min_dist = {} must be < n = {n}",
                    k.saturating_mul(min_dist)
                )));
            }
            check_min_len(n)?;
            let required = min_dist.saturating_mul(k).saturating_mul(2).saturating_add(1);
            if n < required {
                return Err(BcpError::model_config(format!(
                    "series too short for k={k}, min_dist={min_dist}: need n >= {required}, got {n}"
                )));
            }
            Model::MeanShift(MeanShiftModel::new(
                values,
                k,
                min_dist,
                spec.priors,
                Standardization::fit(values),
            ))
        }
        ModelVariant::TrendShift | ModelVariant::VarianceShift => {
            check_min_len(n)?;
            let required = 2 * SINGLE_EDGE_MARGIN + 1;
            if n < required {
                return Err(BcpError::model_config(format!(
                    "series too short for a single change point with edge margin {SINGLE_EDGE_MARGIN}: need n >= {required}, got {n}"
                )));
            }
            let (lower, upper) = (SINGLE_EDGE_MARGIN, n - SINGLE_EDGE_MARGIN);
            let scaling = Standardization::fit(values);
            if spec.variant == ModelVariant::TrendShift {
                Model::TrendShift(TrendShiftModel::new(values, lower, upper, spec.priors, scaling))
            } else {
                Model::VarianceShift(VarianceShiftModel::new(
                    values,
                    lower,
                    upper,
                    spec.priors,
                    scaling,
                ))
            }
        }
    };

    tracing::debug!(
        model = model.label(),
        n,
        dim = model.dim(),
        "built change-point model"
    );
    Ok(model)
}

fn check_min_len(n: usize) -> Result<(), BcpError> {
    if n < MIN_SERIES_LEN {
        return Err(BcpError::data(format!(
            "series too short: need at least {MIN_SERIES_LEN} points, got {n}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::build;
    use crate::samples::ChangePointKind;
    use crate::spec::{ChangePointModelSpec, PriorConfig};
    use bcp_core::{ErrorKind, TimeSeries};
    use chrono::NaiveDate;

    fn series(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2019, 6, 1).expect("valid test date");
        TimeSeries::daily(start, (0..n).map(|t| t as f64).collect()).expect("valid series")
    }

    #[test]
    fn infeasible_mean_shift_is_model_config_error() {
        let err = build(&series(20), &ChangePointModelSpec::mean_shift(5, 5))
            .expect_err("k * min_dist >= n must fail");
        assert_eq!(err.kind(), ErrorKind::ModelConfig);
        assert!(err.to_string().contains("k * min_dist = 25"));
    }

    #[test]
    fn zero_k_or_min_dist_is_model_config_error() {
        for spec in [
            ChangePointModelSpec::mean_shift(0, 5),
            ChangePointModelSpec::mean_shift(2, 0),
        ] {
            let err = build(&series(100), &spec).expect_err("degenerate spec must fail");
            assert_eq!(err.kind(), ErrorKind::ModelConfig);
        }
    }

    #[test]
    fn placement_check_precedes_length_check() {
        let err = build(&series(5), &ChangePointModelSpec::mean_shift(1, 5))
            .expect_err("k * min_dist >= n reported first");
        assert_eq!(err.kind(), ErrorKind::ModelConfig);

        let err = build(&series(9), &ChangePointModelSpec::mean_shift(1, 2))
            .expect_err("short series must fail");
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn edge_buffer_is_enforced() {
        let err = build(&series(20), &ChangePointModelSpec::mean_shift(2, 5))
            .expect_err("n < 2 * min_dist * k + 1 must fail");
        assert_eq!(err.kind(), ErrorKind::ModelConfig);
        assert!(err.to_string().contains("need n >= 21"));
        build(&series(21), &ChangePointModelSpec::mean_shift(2, 5)).expect("boundary n is fine");
    }

    #[test]
    fn single_variants_need_twenty_one_points() {
        for spec in [
            ChangePointModelSpec::trend_shift(),
            ChangePointModelSpec::variance_shift(),
        ] {
            let err = build(&series(8), &spec).expect_err("n < 10 must fail");
            assert_eq!(err.kind(), ErrorKind::Data);
            let err = build(&series(20), &spec).expect_err("n < 21 must fail");
            assert_eq!(err.kind(), ErrorKind::ModelConfig);
            let model = build(&series(21), &spec).expect("n = 21 is feasible");
            assert_eq!(
                model.kind(),
                ChangePointKind::Single {
                    lower: 10,
                    upper: 11
                }
            );
        }
    }

    #[test]
    fn invalid_priors_are_rejected_before_anything_else() {
        let spec = ChangePointModelSpec::mean_shift(0, 0).with_priors(PriorConfig {
            level_scale: -1.0,
            ..PriorConfig::default()
        });
        let err = build(&series(3), &spec).expect_err("bad priors must fail");
        assert!(err.to_string().contains("priors.level_scale"));
    }
}
