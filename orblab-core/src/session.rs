//! Session windows — opening-range and scan boundaries as absolute datetimes.
//!
//! Every boundary is a full `NaiveDateTime` computed with date arithmetic.
//! A scan window whose end time-of-day is at or before its open rolls to the
//! next calendar day, so a 23:00 window scanning until 09:00 resolves touches
//! after midnight on the correct day. Bare time-of-day comparisons are never
//! used downstream.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::WindowId;

/// One configured opening-range window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub id: WindowId,
    /// Window open, exchange-local wall time.
    pub open: NaiveTime,
    /// Opening-range formation length in minutes.
    pub open_minutes: u32,
    /// End of the trade scan, exchange-local wall time. At or before `open`
    /// means the following calendar day.
    pub scan_until: NaiveTime,
}

impl WindowSpec {
    /// Absolute [start, end) of the opening-range formation on `date`.
    pub fn range_bounds(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = date.and_time(self.open);
        let end = start + Duration::minutes(i64::from(self.open_minutes));
        (start, end)
    }

    /// Absolute [start, end) of the trade scan on `date`: from the end of
    /// range formation to `scan_until`, rolling the end date forward when
    /// the scan crosses midnight.
    pub fn scan_bounds(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let (_, range_end) = self.range_bounds(date);
        let end_date = if self.scan_until <= self.open {
            date.succ_opt().expect("calendar overflow")
        } else {
            date
        };
        (range_end, end_date.and_time(self.scan_until))
    }
}

/// Look up a window spec by id.
pub fn find_window<'a>(windows: &'a [WindowSpec], id: &WindowId) -> Option<&'a WindowSpec> {
    windows.iter().find(|w| &w.id == id)
}
