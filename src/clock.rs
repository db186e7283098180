//! Regional civil time
//!
//! The work calendar runs on a region with a constant UTC-5 offset and no
//! daylight-saving transitions. Instead of a timezone database lookup we project
//! instants by that fixed offset: the result is a naive wall-clock value whose
//! fields (year, month, day, hour, minute) are the regional ones.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Offset of regional civil time from UTC, in hours
pub const UTC_OFFSET_HOURS: i32 = -5;

const UTC_OFFSET_SECS: i32 = UTC_OFFSET_HOURS * 3600;

/// The fixed regional offset as a chrono timezone
pub fn regional_offset() -> FixedOffset {
    FixedOffset::east_opt(UTC_OFFSET_SECS).expect("UTC-5 is within the +/-24h offset bound")
}

/// Project an absolute instant onto regional wall-clock fields
pub fn to_regional(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&regional_offset()).naive_local()
}

/// Interpret regional wall-clock fields as an absolute instant.
/// Returns None only when the shifted value leaves chrono's representable range.
pub fn to_utc(civil: NaiveDateTime) -> Option<DateTime<Utc>> {
    // A fixed offset has exactly one mapping for every local time
    civil
        .and_local_timezone(regional_offset())
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Timelike};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_to_regional_subtracts_five_hours() {
        let civil = to_regional(utc("2025-01-24T22:00:00Z"));
        assert_eq!(civil.date(), NaiveDate::from_ymd_opt(2025, 1, 24).unwrap());
        assert_eq!(civil.hour(), 17);
        assert_eq!(civil.minute(), 0);
    }

    #[test]
    fn test_to_regional_crosses_midnight() {
        // 03:00 UTC is 22:00 the previous regional day
        let civil = to_regional(utc("2025-01-25T03:00:00Z"));
        assert_eq!(civil.day(), 24);
        assert_eq!(civil.hour(), 22);
    }

    #[test]
    fn test_to_utc_adds_five_hours() {
        let civil = NaiveDate::from_ymd_opt(2025, 1, 27)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(to_utc(civil), Some(utc("2025-01-27T14:00:00Z")));
    }

    #[test]
    fn test_regional_offset_value() {
        assert_eq!(regional_offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_current_time_is_behind_utc() {
        let now = Utc::now();
        let diff = now.naive_utc() - to_regional(now);
        assert_eq!(diff.num_minutes(), 300);
    }
}
