// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Differentiable log density over an unconstrained real vector.
///
/// Values are unnormalized. Points outside the support, or where the
/// computation overflows, return a non-finite value; samplers treat that as
/// a rejection.
pub trait LogDensity: Sync {
    fn dim(&self) -> usize;

    /// Returns the log density and overwrites `grad` with its gradient.
    fn log_density_and_gradient(&self, theta: &[f64], grad: &mut [f64]) -> f64;

    fn log_density(&self, theta: &[f64]) -> f64 {
        let mut grad = vec![0.0; self.dim()];
        self.log_density_and_gradient(theta, &mut grad)
    }
}

/// Normal(loc, scale) log density up to a constant, and its derivative.
pub(crate) fn normal_prior(value: f64, loc: f64, scale: f64) -> (f64, f64) {
    let inv_var = 1.0 / (scale * scale);
    let centered = value - loc;
    (-0.5 * centered * centered * inv_var, -centered * inv_var)
}

/// HalfNormal(scale) on `sigma = exp(log_sigma)`, expressed on `log_sigma`
/// with the log-Jacobian included, and its derivative.
pub(crate) fn half_normal_log_scale_prior(log_sigma: f64, scale: f64) -> (f64, f64) {
    let var_ratio = (2.0 * log_sigma).exp() / (scale * scale);
    (-0.5 * var_ratio + log_sigma, -var_ratio + 1.0)
}

/// Gaussian log likelihood of `count` residuals with total `rss` at noise
/// `exp(log_sigma)`, and its derivative in `log_sigma`.
pub(crate) fn gaussian_log_scale_term(count: f64, rss: f64, log_sigma: f64) -> (f64, f64) {
    let inv_var = (-2.0 * log_sigma).exp();
    (
        -count * log_sigma - 0.5 * rss * inv_var,
        -count + rss * inv_var,
    )
}

pub(crate) fn all_finite(theta: &[f64]) -> bool {
    theta.iter().all(|value| value.is_finite())
}
