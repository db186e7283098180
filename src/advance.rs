//! Business-time advancement
//!
//! Both operations expect an already-normalized working instant.

use chrono::{NaiveDateTime, TimeDelta};

use crate::calendar::{at_hour, minute_of_day, BusinessCalendar};

/// Move forward `days` working days, keeping the time of day.
///
/// Each step goes to the next calendar day and keeps going while that day is
/// not a working day. Returns None if the calendar runs out.
pub fn add_working_days(
    calendar: &BusinessCalendar<'_>,
    civil: NaiveDateTime,
    days: u32,
) -> Option<NaiveDateTime> {
    let mut date = civil.date();
    for _ in 0..days {
        date = calendar.next_working_day(date)?;
    }
    Some(date.and_time(civil.time()))
}

/// Move forward `hours` working hours, counted in minutes.
///
/// Lunch is crossed without consuming time; finishing the afternoon segment
/// continues at the start of the next working day. Returns None if the
/// calendar runs out.
pub fn add_working_hours(
    calendar: &BusinessCalendar<'_>,
    civil: NaiveDateTime,
    hours: u32,
) -> Option<NaiveDateTime> {
    let window = calendar.hours();
    let mut current = civil;
    let mut remaining = u64::from(hours) * 60;

    while remaining > 0 {
        let minute = minute_of_day(&current);

        if window.is_lunch(minute) {
            current = at_hour(current.date(), window.lunch_end_hour);
            continue;
        }

        let available = u64::from(window.minutes_left_in_segment(minute));

        if remaining <= available {
            current = current.checked_add_signed(TimeDelta::minutes(remaining as i64))?;
            remaining = 0;
        } else {
            remaining -= available;
            current = if minute < window.lunch_start_minute() {
                at_hour(current.date(), window.lunch_end_hour)
            } else {
                let next = calendar.next_working_day(current.date())?;
                at_hour(next, window.start_hour)
            };
        }
    }

    Some(current)
}
