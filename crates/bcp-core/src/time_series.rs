// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BcpError;
use chrono::NaiveDate;

/// Ordered, validated daily series. Position `0..n-1` is the model index.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Constructs a validated `TimeSeries`.
    ///
    /// Dates must be strictly increasing and every value finite.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, BcpError> {
        if dates.len() != values.len() {
            return Err(BcpError::data(format!(
                "length mismatch: got {} dates and {} values",
                dates.len(),
                values.len()
            )));
        }
        if dates.is_empty() {
            return Err(BcpError::data("series must contain at least one point"));
        }

        if let Some(idx) = values.iter().position(|value| !value.is_finite()) {
            return Err(BcpError::data(format!(
                "value at position {idx} is not finite: {}",
                values[idx]
            )));
        }

        if let Some(idx) = dates.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(BcpError::data(format!(
                "dates must be strictly increasing: position {} has {} and position {} has {}",
                idx,
                dates[idx],
                idx + 1,
                dates[idx + 1]
            )));
        }

        Ok(Self { dates, values })
    }

    /// Builds a series on consecutive calendar days starting at `start`.
    pub fn daily(start: NaiveDate, values: Vec<f64>) -> Result<Self, BcpError> {
        let dates = start
            .iter_days()
            .take(values.len())
            .collect::<Vec<_>>();
        if dates.len() != values.len() {
            return Err(BcpError::data(format!(
                "calendar overflow while laying out {} daily points from {start}",
                values.len()
            )));
        }
        Self::new(dates, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed series; kept for slice-like ergonomics.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Date at `position`, or `None` past the end.
    pub fn date_at(&self, position: usize) -> Option<NaiveDate> {
        self.dates.get(position).copied()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }
}
