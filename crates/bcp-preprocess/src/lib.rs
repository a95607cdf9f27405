// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod stationarity;

pub use stationarity::{AdfTest, CriticalValues, Stationarity, adf_test};

use bcp_core::numeric::{RunningMoments, median};
use bcp_core::{BcpError, TimeSeries};

/// Transform applied to the raw series before inference.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transform {
    #[default]
    None,
    LogReturns,
}

impl Transform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LogReturns => "log_returns",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub notes: Vec<String>,
}

/// Series produced by [`apply`], with a report per step that ran.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformedSeries {
    pub series: TimeSeries,
    pub reports: Vec<StepReport>,
}

/// Applies `transform` to `series`.
pub fn apply(series: &TimeSeries, transform: Transform) -> Result<TransformedSeries, BcpError> {
    match transform {
        Transform::None => Ok(TransformedSeries {
            series: series.clone(),
            reports: vec![],
        }),
        Transform::LogReturns => {
            let returns = log_returns(series)?;
            let report = StepReport {
                step: transform.as_str().to_string(),
                notes: vec![format!(
                    "n_in={}, n_out={}, first_date={}",
                    series.len(),
                    returns.len(),
                    returns.first_date()
                )],
            };
            Ok(TransformedSeries {
                series: returns,
                reports: vec![report],
            })
        }
    }
}

/// `r_t = ln(p_t / p_{t-1})`, dated at `t`.
///
/// Output has `n - 1` points aligned with the input dates `1..n`. Every
/// price must be strictly positive.
pub fn log_returns(series: &TimeSeries) -> Result<TimeSeries, BcpError> {
    if series.len() < 2 {
        return Err(BcpError::data(format!(
            "log returns need at least 2 points; got {}",
            series.len()
        )));
    }

    if let Some((idx, value)) = series
        .values()
        .iter()
        .copied()
        .enumerate()
        .find(|&(_, value)| value <= 0.0)
    {
        return Err(BcpError::data(format!(
            "log returns require positive prices; value at position {idx} ({}) is {value}",
            series.dates()[idx]
        )));
    }

    let values = series
        .values()
        .windows(2)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect::<Vec<_>>();
    let dates = series.dates()[1..].to_vec();

    tracing::debug!(n_in = series.len(), n_out = values.len(), "computed log returns");
    TimeSeries::new(dates, values)
}

/// Descriptive statistics of a series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesSummary {
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl SeriesSummary {
    pub fn of(series: &TimeSeries) -> Self {
        let values = series.values();
        let mut moments = RunningMoments::default();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &value in values {
            moments.push(value);
            min = min.min(value);
            max = max.max(value);
        }

        Self {
            n: values.len(),
            mean: moments.mean().unwrap_or(0.0),
            std: moments.sample_variance().map_or(0.0, f64::sqrt),
            min,
            max,
            median: median(values).unwrap_or(0.0),
        }
    }
}

/// Optional preprocessing namespace.
pub fn crate_name() -> &'static str {
    let _ = bcp_core::crate_name();
    "bcp-preprocess"
}
