// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::associate::associate;
use crate::extract::ChangePointEstimate;
use crate::impact::{ImpactMeasure, ImpactSummary};
use bcp_core::{BcpError, EventRecord};
use chrono::NaiveDate;

/// A change point paired with its nearest catalog event and its impact.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(into = "InsightRecord"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Insight {
    pub change_point: ChangePointEstimate,
    pub matched_event: EventRecord,
    /// `event.date - change_point.date` in days; positive when the event
    /// follows the change.
    pub day_offset: i64,
    pub impact: Option<ImpactSummary>,
}

/// Flat wire form of an [`Insight`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct InsightRecord {
    pub change_point_date: NaiveDate,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub day_offset: i64,
    pub region: String,
    pub event_type: String,
    pub notes: String,
    pub impact: Option<ImpactRecord>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ImpactRecord {
    pub measure: ImpactMeasure,
    pub before: f64,
    pub after: f64,
    pub difference: f64,
    pub pct_change: Option<f64>,
}

impl From<&ImpactSummary> for ImpactRecord {
    fn from(impact: &ImpactSummary) -> Self {
        Self {
            measure: impact.measure,
            before: impact.before,
            after: impact.after,
            difference: impact.difference,
            pct_change: impact.percent_change,
        }
    }
}

impl From<&Insight> for InsightRecord {
    fn from(insight: &Insight) -> Self {
        let event = &insight.matched_event;
        Self {
            change_point_date: insight.change_point.date,
            event_name: event.name.clone(),
            event_date: event.date,
            day_offset: insight.day_offset,
            region: event.region.clone(),
            event_type: event.event_type.clone(),
            notes: event.notes.clone(),
            impact: insight.impact.as_ref().map(ImpactRecord::from),
        }
    }
}

impl From<Insight> for InsightRecord {
    fn from(insight: Insight) -> Self {
        Self::from(&insight)
    }
}

impl Insight {
    pub fn record(&self) -> InsightRecord {
        InsightRecord::from(self)
    }

    /// One-line human-readable description.
    pub fn describe(&self) -> String {
        let timing = match self.day_offset {
            0 => "on the day of".to_string(),
            offset if offset > 0 => format!("{offset} days before"),
            offset => format!("{} days after", offset.unsigned_abs()),
        };
        let mut line = format!(
            "change on {} {timing} '{}' ({})",
            self.change_point.date, self.matched_event.name, self.matched_event.date
        );
        if let Some(impact) = &self.impact {
            line.push_str(&format!(
                ": {} {:.4} -> {:.4}",
                impact.measure.as_str(),
                impact.before,
                impact.after
            ));
            if let Some(pct) = impact.percent_change {
                line.push_str(&format!(" ({pct:+.1}%)"));
            }
        }
        line
    }
}

/// Pairs every estimate with its nearest event and the impact of its slot.
///
/// Fails with an event-association error when there are estimates but the
/// catalog is empty.
pub fn generate_insights(
    estimates: &[ChangePointEstimate],
    impacts: &[ImpactSummary],
    events: &[EventRecord],
) -> Result<Vec<Insight>, BcpError> {
    estimates
        .iter()
        .map(|estimate| {
            let event = associate(estimate.date, events)?;
            Ok(Insight {
                change_point: estimate.clone(),
                matched_event: event.clone(),
                day_offset: event.days_from(estimate.date),
                impact: impacts
                    .iter()
                    .find(|impact| impact.slot == estimate.slot)
                    .cloned(),
            })
        })
        .collect()
}
