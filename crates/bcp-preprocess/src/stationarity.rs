// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Augmented Dickey-Fuller unit-root test with a constant term.
//!
//! Regression: `dy_t = a + g * y_{t-1} + sum_{i=1..p} b_i * dy_{t-i} + e_t`.
//! The lag order `p` minimizes AIC over `0..=max_lag` on a common sample,
//! then the chosen order is refitted on the longest sample it allows. The
//! statistic is the t-ratio of `g`; p-values and critical values follow
//! MacKinnon (1994, 2010) for one series with a constant.

use bcp_core::BcpError;
use statrs::distribution::{ContinuousCDF, Normal};

/// Series shorter than this cannot support the lagged regression.
pub const MIN_ADF_LEN: usize = 10;

/// Null of a unit root is rejected below this p-value.
const SIGNIFICANCE: f64 = 0.05;

// MacKinnon (2010) response surfaces `c0 + c1/T + c2/T^2 + c3/T^3`.
const CRIT_1PCT: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5PCT: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10PCT: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

// MacKinnon (1994) p-value polynomials in the statistic.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const SMALL_P: [f64; 3] = [2.1659, 1.4412, 3.8269e-2];
const LARGE_P: [f64; 4] = [1.7339, 9.3202e-1, -1.2745e-1, -1.0368e-2];

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stationarity {
    Stationary,
    NonStationary,
}

impl Stationarity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stationary => "Stationary",
            Self::NonStationary => "Non-stationary",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

impl CriticalValues {
    /// Finite-sample critical values for `nobs` regression observations.
    pub fn for_nobs(nobs: usize) -> Self {
        let inv = 1.0 / nobs.max(1) as f64;
        let surface = |coef: [f64; 4]| coef[0] + inv * (coef[1] + inv * (coef[2] + inv * coef[3]));
        Self {
            one_percent: surface(CRIT_1PCT),
            five_percent: surface(CRIT_5PCT),
            ten_percent: surface(CRIT_10PCT),
        }
    }
}

/// Outcome of [`adf_test`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AdfTest {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    /// Observations in the final regression.
    pub nobs: usize,
    pub critical_values: CriticalValues,
    pub conclusion: Stationarity,
}

impl AdfTest {
    pub fn is_stationary(&self) -> bool {
        self.conclusion == Stationarity::Stationary
    }

    pub fn describe(&self) -> String {
        format!(
            "adf statistic={:.4}, p={:.4}, lag={}, nobs={}: {}",
            self.statistic,
            self.p_value,
            self.used_lag,
            self.nobs,
            self.conclusion.as_str()
        )
    }
}

/// Runs the ADF test on `values`.
///
/// `max_lag` defaults to `ceil(12 * (n / 100)^(1/4))` and is capped at
/// `n / 2 - 2` so every candidate regression keeps more rows than columns.
pub fn adf_test(values: &[f64], max_lag: Option<usize>) -> Result<AdfTest, BcpError> {
    let n = values.len();
    if n < MIN_ADF_LEN {
        return Err(BcpError::data(format!(
            "ADF test needs at least {MIN_ADF_LEN} points; got {n}"
        )));
    }
    if let Some(idx) = values.iter().position(|value| !value.is_finite()) {
        return Err(BcpError::data(format!(
            "ADF test needs finite values; position {idx} is {}",
            values[idx]
        )));
    }

    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let max_lag = max_lag.unwrap_or(schwert).min(n / 2 - 2);
    let diffs = values.windows(2).map(|pair| pair[1] - pair[0]).collect::<Vec<_>>();

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let fit = regress(values, &diffs, lag, max_lag)?;
        if best.is_none_or(|(aic, _)| fit.aic < aic) {
            best = Some((fit.aic, lag));
        }
    }
    let used_lag = best.map_or(0, |(_, lag)| lag);
    let fit = regress(values, &diffs, used_lag, used_lag)?;

    let p_value = mackinnon_p_value(fit.t_level);
    let conclusion = if p_value < SIGNIFICANCE {
        Stationarity::Stationary
    } else {
        Stationarity::NonStationary
    };
    tracing::debug!(
        statistic = fit.t_level,
        p_value,
        used_lag,
        nobs = fit.nobs,
        "adf test"
    );
    Ok(AdfTest {
        statistic: fit.t_level,
        p_value,
        used_lag,
        nobs: fit.nobs,
        critical_values: CriticalValues::for_nobs(fit.nobs),
        conclusion,
    })
}

/// Approximate p-value of an ADF statistic (constant, one series).
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let z = if statistic <= TAU_STAR {
        polynomial(&SMALL_P, statistic)
    } else {
        polynomial(&LARGE_P, statistic)
    };
    Normal::standard().cdf(z)
}

fn polynomial(coef: &[f64], x: f64) -> f64 {
    coef.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

struct Fit {
    t_level: f64,
    aic: f64,
    nobs: usize,
}

/// OLS of `diffs[t]` on `[1, values[t], diffs[t-1..=t-lag]]` for
/// `t in first..diffs.len()`.
fn regress(values: &[f64], diffs: &[f64], lag: usize, first: usize) -> Result<Fit, BcpError> {
    let cols = lag + 2;
    let nobs = diffs.len().saturating_sub(first);
    if nobs <= cols {
        return Err(BcpError::data(format!(
            "ADF regression with lag {lag} has {nobs} rows for {cols} columns"
        )));
    }

    let mut xtx = vec![vec![0.0; cols]; cols];
    let mut xty = vec![0.0; cols];
    let mut yty = 0.0;
    let mut row = vec![0.0; cols];
    for t in first..diffs.len() {
        row[0] = 1.0;
        row[1] = values[t];
        for i in 1..=lag {
            row[i + 1] = diffs[t - i];
        }
        let y = diffs[t];
        yty += y * y;
        for a in 0..cols {
            xty[a] += row[a] * y;
            for b in 0..cols {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }

    let mut unit = vec![0.0; cols];
    unit[1] = 1.0;
    let Some(solved) = solve(xtx, vec![xty.clone(), unit]) else {
        return Err(BcpError::data("ADF regression is singular"));
    };
    let (beta, inv_col) = (&solved[0], &solved[1]);

    let ssr = (yty - beta.iter().zip(&xty).map(|(b, xy)| b * xy).sum::<f64>()).max(0.0);
    let dof = (nobs - cols) as f64;
    let se = (ssr / dof * inv_col[1]).sqrt();
    if !(se.is_finite() && se > 0.0) {
        return Err(BcpError::data("ADF regression has a degenerate residual"));
    }

    let nobs_f = nobs as f64;
    let llf = -0.5 * nobs_f * ((2.0 * std::f64::consts::PI).ln() + (ssr / nobs_f).ln() + 1.0);
    Ok(Fit {
        t_level: beta[1] / se,
        aic: -2.0 * llf + 2.0 * cols as f64,
        nobs,
    })
}

/// Solves `a x = b` for every right-hand side in `rhs` by Gaussian
/// elimination with partial pivoting. `None` when `a` is singular.
fn solve(mut a: Vec<Vec<f64>>, mut rhs: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let dim = a.len();
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, value| acc.max(value.abs()));
    let tolerance = 1e-12 * scale.max(1.0);

    for col in 0..dim {
        let pivot = (col..dim).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= tolerance {
            return None;
        }
        a.swap(col, pivot);
        for b in &mut rhs {
            b.swap(col, pivot);
        }
        for r in col + 1..dim {
            let factor = a[r][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..dim {
                a[r][c] -= factor * a[col][c];
            }
            for b in &mut rhs {
                b[r] -= factor * b[col];
            }
        }
    }

    for b in &mut rhs {
        for col in (0..dim).rev() {
            let tail: f64 = (col + 1..dim).map(|c| a[col][c] * b[c]).sum();
            b[col] = (b[col] - tail) / a[col][col];
        }
    }
    Some(rhs)
}
