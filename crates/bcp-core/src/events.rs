// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;

/// One entry of the event catalog change points are matched against.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub name: String,
    pub date: NaiveDate,
    #[cfg_attr(feature = "serde", serde(default))]
    pub region: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub event_type: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub notes: String,
}

impl EventRecord {
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
            region: String::new(),
            event_type: String::new(),
            notes: String::new(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Signed day distance `self.date - date`.
    pub fn days_from(&self, date: NaiveDate) -> i64 {
        (self.date - date).num_days()
    }
}
