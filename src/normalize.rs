//! Backward normalization onto working time
//!
//! Maps any regional civil time to the nearest working instant at or before it:
//!
//! 1. non-working day: previous day at end of day, re-evaluate
//! 2. before start of day: previous day at end of day, re-evaluate
//! 3. inside lunch: snap to lunch start
//! 4. at or after end of day: snap to end of day
//! 5. otherwise unchanged
//!
//! Rules 1 and 2 can land on another non-working day (holiday runs, weekends),
//! so evaluation restarts after every backward day step.

use chrono::NaiveDateTime;

use crate::calendar::{at_hour, minute_of_day, BusinessCalendar};

/// Normalize `civil` onto working time, only moving backward.
///
/// Returns None if stepping back would leave chrono's date range.
pub fn normalize(calendar: &BusinessCalendar<'_>, civil: NaiveDateTime) -> Option<NaiveDateTime> {
    let hours = calendar.hours();
    let mut current = civil;

    // Each pass either returns or moves one day back; the holiday set is finite,
    // so a working day is always reached.
    loop {
        let date = current.date();

        if !calendar.is_working_day(date) {
            current = at_hour(date.pred_opt()?, hours.end_hour);
            continue;
        }

        let minute = minute_of_day(&current);

        if hours.is_within_window(minute) {
            return Some(current);
        }

        if minute < hours.start_minute() {
            current = at_hour(date.pred_opt()?, hours.end_hour);
            continue;
        }

        // Lunch start itself is a valid boundary
        if hours.is_lunch(minute) {
            return Some(at_hour(date, hours.lunch_start_hour));
        }

        // Only at or after end of day remains
        return Some(at_hour(date, hours.end_hour));
    }
}
