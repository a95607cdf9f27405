// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, EventRecord};
use chrono::NaiveDate;

/// Catalog entry closest to `date` in absolute days. Ties go to the entry
/// that appears first in `events`.
pub fn associate(date: NaiveDate, events: &[EventRecord]) -> Result<&EventRecord, BcpError> {
    let mut best: Option<(&EventRecord, u64)> = None;
    for event in events {
        let distance = event.days_from(date).unsigned_abs();
        if best.is_none_or(|(_, current)| distance < current) {
            best = Some((event, distance));
        }
    }
    best.map(|(event, _)| event).ok_or_else(|| {
        BcpError::event_association(format!(
            "cannot associate change point on {date}: event catalog is empty"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::associate;
    use bcp_core::EventRecord;
    use chrono::NaiveDate;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, d).expect("valid test date")
    }

    #[test]
    fn picks_nearest_event_in_either_direction() {
        let events = vec![
            EventRecord::new("early", day(1, 1)),
            EventRecord::new("late", day(3, 20)),
            EventRecord::new("near", day(3, 3)),
        ];
        let matched = associate(day(3, 6), &events).expect("catalog is non-empty");
        assert_eq!(matched.name, "near");
    }

    #[test]
    fn equidistant_events_resolve_to_first_catalog_entry() {
        let events = vec![
            EventRecord::new("after", day(2, 15)),
            EventRecord::new("before", day(2, 5)),
        ];
        for _ in 0..10 {
            let matched = associate(day(2, 10), &events).expect("catalog is non-empty");
            assert_eq!(matched.name, "after");
        }

        let reversed = events.into_iter().rev().collect::<Vec<_>>();
        let matched = associate(day(2, 10), &reversed).expect("catalog is non-empty");
        assert_eq!(matched.name, "before");
    }

    #[test]
    fn empty_catalog_is_an_association_error() {
        let err = associate(day(1, 1), &[]).expect_err("empty catalog must fail");
        assert!(err.to_string().starts_with("event association error"));
        assert!(!err.kind().is_client_error());
    }
}
