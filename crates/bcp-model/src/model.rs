// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::density::LogDensity;
use crate::mean_shift::MeanShiftModel;
use crate::samples::{ChangePointKind, Draw};
use crate::spec::ModelVariant;
use crate::standardize::Standardization;
use crate::trend_shift::TrendShiftModel;
use crate::variance_shift::VarianceShiftModel;
use rand::Rng;
use std::ops::Range;

/// Full parameter state: continuous vector plus the discrete change point of
/// single-change-point variants.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub theta: Vec<f64>,
    pub tau: Option<usize>,
}

/// Built change-point model, ready for sampling.
#[derive(Clone, Debug, PartialEq)]
pub enum Model {
    MeanShift(MeanShiftModel),
    TrendShift(TrendShiftModel),
    VarianceShift(VarianceShiftModel),
}

impl Model {
    pub fn label(&self) -> &'static str {
        self.variant().label()
    }

    pub fn variant(&self) -> ModelVariant {
        match self {
            Self::MeanShift(model) => ModelVariant::MeanShift {
                k: model.k(),
                min_dist: model.min_dist(),
            },
            Self::TrendShift(_) => ModelVariant::TrendShift,
            Self::VarianceShift(_) => ModelVariant::VarianceShift,
        }
    }

    pub fn n(&self) -> usize {
        match self {
            Self::MeanShift(model) => model.n(),
            Self::TrendShift(model) => model.n(),
            Self::VarianceShift(model) => model.n(),
        }
    }

    /// Length of the continuous parameter vector.
    pub fn dim(&self) -> usize {
        match self {
            Self::MeanShift(model) => model.dim(),
            Self::TrendShift(model) => model.dim(),
            Self::VarianceShift(model) => model.dim(),
        }
    }

    pub fn kind(&self) -> ChangePointKind {
        match self {
            Self::MeanShift(model) => model.kind(),
            Self::TrendShift(model) => model.kind(),
            Self::VarianceShift(model) => model.kind(),
        }
    }

    /// Inclusive integer support of the discrete change point, if any.
    pub fn discrete_support(&self) -> Option<(usize, usize)> {
        match self {
            Self::MeanShift(_) => None,
            Self::TrendShift(model) => Some(model.support()),
            Self::VarianceShift(model) => Some(model.support()),
        }
    }

    /// Coordinates of `theta` that parameterize change-point placement.
    pub fn latent_range(&self) -> Range<usize> {
        match self {
            Self::MeanShift(model) => 0..model.k(),
            Self::TrendShift(_) | Self::VarianceShift(_) => 0..0,
        }
    }

    pub fn parameter_names(&self) -> Vec<String> {
        match self {
            Self::MeanShift(model) => model.parameter_names(),
            Self::TrendShift(model) => model.parameter_names(),
            Self::VarianceShift(model) => model.parameter_names(),
        }
    }

    pub fn standardization(&self) -> Standardization {
        match self {
            Self::MeanShift(model) => model.scaling(),
            Self::TrendShift(model) => model.scaling(),
            Self::VarianceShift(model) => model.scaling(),
        }
    }

    /// Unnormalized log posterior; `-inf` outside the support.
    pub fn log_density(&self, params: &Params) -> f64 {
        let mut grad = vec![0.0; self.dim()];
        self.log_density_and_gradient(params, &mut grad)
    }

    /// Log posterior and its gradient in `theta` (with `tau` held fixed).
    pub fn log_density_and_gradient(&self, params: &Params, grad: &mut [f64]) -> f64 {
        match (self, params.tau) {
            (Self::MeanShift(model), None) => model.log_density_and_gradient(&params.theta, grad),
            (Self::TrendShift(model), Some(tau)) => {
                model.log_density_and_gradient(&params.theta, tau, grad)
            }
            (Self::VarianceShift(model), Some(tau)) => {
                model.log_density_and_gradient(&params.theta, tau, grad)
            }
            _ => {
                grad.fill(0.0);
                f64::NEG_INFINITY
            }
        }
    }

    /// Continuous density with the discrete change point fixed at `tau`.
    pub fn conditional(&self, tau: Option<usize>) -> ConditionalDensity<'_> {
        ConditionalDensity { model: self, tau }
    }

    /// Random starting point inside the support.
    pub fn initial_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Params {
        match self {
            Self::MeanShift(model) => Params {
                theta: model.initial_theta(rng),
                tau: None,
            },
            Self::TrendShift(model) => Params {
                theta: model.initial_theta(rng),
                tau: Some(model.initial_tau(rng)),
            },
            Self::VarianceShift(model) => Params {
                theta: model.initial_theta(rng),
                tau: Some(model.initial_tau(rng)),
            },
        }
    }

    /// Converts a parameter state to a reported draw in original units.
    pub fn draw(&self, params: &Params, log_density: f64) -> Draw {
        let tau = params.tau.unwrap_or_default();
        match self {
            Self::MeanShift(model) => model.draw(&params.theta, log_density),
            Self::TrendShift(model) => model.draw(&params.theta, tau, log_density),
            Self::VarianceShift(model) => model.draw(&params.theta, tau, log_density),
        }
    }
}

/// [`LogDensity`] view of a [`Model`] at a fixed discrete change point.
#[derive(Clone, Copy, Debug)]
pub struct ConditionalDensity<'a> {
    model: &'a Model,
    tau: Option<usize>,
}

impl LogDensity for ConditionalDensity<'_> {
    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn log_density_and_gradient(&self, theta: &[f64], grad: &mut [f64]) -> f64 {
        match (self.model, self.tau) {
            (Model::MeanShift(model), None) => model.log_density_and_gradient(theta, grad),
            (Model::TrendShift(model), Some(tau)) => {
                model.log_density_and_gradient(theta, tau, grad)
            }
            (Model::VarianceShift(model), Some(tau)) => {
                model.log_density_and_gradient(theta, tau, grad)
            }
            _ => {
                grad.fill(0.0);
                f64::NEG_INFINITY
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::build;
    use crate::density::LogDensity;
    use crate::model::Params;
    use crate::spec::ChangePointModelSpec;
    use bcp_core::TimeSeries;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn series(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid test date");
        TimeSeries::daily(start, (0..n).map(|t| (t as f64 * 0.3).sin()).collect())
            .expect("valid series")
    }

    #[test]
    fn initial_params_are_finite_for_every_variant() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        for spec in [
            ChangePointModelSpec::mean_shift(3, 5),
            ChangePointModelSpec::trend_shift(),
            ChangePointModelSpec::variance_shift(),
        ] {
            let model = build(&series(80), &spec).expect("feasible model");
            for _ in 0..20 {
                let params = model.initial_params(&mut rng);
                assert_eq!(params.theta.len(), model.dim());
                assert!(model.log_density(&params).is_finite(), "{}", model.label());
                if let Some((lower, upper)) = model.discrete_support() {
                    let tau = params.tau.expect("single variants carry tau");
                    assert!((lower..=upper).contains(&tau));
                }
            }
        }
    }

    #[test]
    fn mismatched_tau_is_outside_support() {
        let model = build(&series(40), &ChangePointModelSpec::variance_shift())
            .expect("feasible model");
        let params = Params {
            theta: vec![0.0; 3],
            tau: None,
        };
        assert_eq!(model.log_density(&params), f64::NEG_INFINITY);
        assert_eq!(model.conditional(None).log_density(&[0.0; 3]), f64::NEG_INFINITY);
    }

    #[test]
    fn conditional_agrees_with_model_density() {
        let model = build(&series(50), &ChangePointModelSpec::trend_shift()).expect("model");
        let theta = vec![0.2, -0.1, 0.4, 0.3, -0.2];
        let params = Params {
            theta: theta.clone(),
            tau: Some(25),
        };
        let direct = model.log_density(&params);
        let conditional = model.conditional(Some(25)).log_density(&theta);
        assert_eq!(direct, conditional);
        assert_eq!(model.latent_range(), 0..0);
    }

    #[test]
    fn mean_shift_exposes_latent_range_and_kind() {
        let model = build(&series(60), &ChangePointModelSpec::mean_shift(2, 6)).expect("model");
        assert_eq!(model.latent_range(), 0..2);
        assert_eq!(model.dim(), 6);
        assert!(model.discrete_support().is_none());
        assert_eq!(model.label(), "mean_shift");
    }
}
