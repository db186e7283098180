/// Business calendar
/// Working days are Monday-Friday minus published holidays; the working window
/// is 08:00-17:00 regional time with a 12:00-13:00 lunch break.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::holidays::HolidaySet;

/// Fixed working-hours window, in regional civil hours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub lunch_start_hour: u32,
    pub lunch_end_hour: u32,
}

pub const WORKING_HOURS: WorkingHours = WorkingHours {
    start_hour: 8,        // 8:00 AM
    end_hour: 17,         // 5:00 PM
    lunch_start_hour: 12, // 12:00 PM
    lunch_end_hour: 13,   // 1:00 PM
};

impl WorkingHours {
    pub const fn start_minute(&self) -> u32 {
        self.start_hour * 60
    }

    pub const fn end_minute(&self) -> u32 {
        self.end_hour * 60
    }

    pub const fn lunch_start_minute(&self) -> u32 {
        self.lunch_start_hour * 60
    }

    pub const fn lunch_end_minute(&self) -> u32 {
        self.lunch_end_hour * 60
    }

    /// Minute-of-day falls inside [lunch start, lunch end)
    pub const fn is_lunch(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.lunch_start_minute() && minute_of_day < self.lunch_end_minute()
    }

    /// Minute-of-day falls inside a working segment (lunch excluded)
    pub const fn is_within_window(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.start_minute()
            && minute_of_day < self.end_minute()
            && !self.is_lunch(minute_of_day)
    }

    /// Minutes left in the segment containing `minute_of_day`.
    /// Before lunch the segment ends at lunch start, otherwise at end of day.
    pub const fn minutes_left_in_segment(&self, minute_of_day: u32) -> u32 {
        if minute_of_day < self.lunch_start_minute() {
            self.lunch_start_minute() - minute_of_day
        } else {
            self.end_minute().saturating_sub(minute_of_day)
        }
    }
}

/// Minute-of-day of a civil time; seconds are ignored
pub fn minute_of_day(civil: &NaiveDateTime) -> u32 {
    civil.hour() * 60 + civil.minute()
}

/// `date` at `hour`:00:00
pub fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
}

/// Working-day predicate over a fixed holiday set
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar<'a> {
    holidays: &'a HolidaySet,
    hours: WorkingHours,
}

impl<'a> BusinessCalendar<'a> {
    pub fn new(holidays: &'a HolidaySet) -> Self {
        Self {
            holidays,
            hours: WORKING_HOURS,
        }
    }

    pub fn hours(&self) -> &WorkingHours {
        &self.hours
    }

    /// Monday-Friday and not a holiday
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        // 0 = Sunday ... 6 = Saturday
        let weekday = date.weekday().num_days_from_sunday();
        (1..=5).contains(&weekday) && !self.holidays.contains(date)
    }

    /// First working day strictly after `date`.
    /// None if the calendar runs out before one is found.
    pub fn next_working_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut next = date.succ_opt()?;
        while !self.is_working_day(next) {
            next = next.succ_opt()?;
        }
        Some(next)
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    fn segment_never_crosses_lunch() {
        let minute: u32 = kani::any();
        kani::assume(minute < 24 * 60);
        kani::assume(WORKING_HOURS.is_within_window(minute));

        let end = minute + WORKING_HOURS.minutes_left_in_segment(minute);
        kani::assert(
            end == WORKING_HOURS.lunch_start_minute() || end == WORKING_HOURS.end_minute(),
            "a segment ends at lunch start or end of day",
        );
    }

    #[kani::proof]
    fn lunch_outside_window() {
        let minute: u32 = kani::any();
        kani::assume(minute < 24 * 60);
        if WORKING_HOURS.is_lunch(minute) {
            kani::assert(!WORKING_HOURS.is_within_window(minute), "lunch is never working time");
        }
    }
}
