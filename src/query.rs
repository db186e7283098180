//! `/calculate` query parsing and validation
//!
//! Turns a raw query string into a [`BusinessRequest`]. Everything rejected here
//! is a client error and never reaches the calculator.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::calculator::BusinessRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("At least one of \"days\" or \"hours\" parameters must be provided")]
    MissingCounts,

    #[error("Parameter \"{0}\" must be a non-negative integer")]
    InvalidCount(&'static str),

    #[error("Parameter \"date\" must be in ISO 8601 format with Z suffix")]
    DateNotUtc,

    #[error("Parameter \"date\" is not a valid date")]
    InvalidDate,

    #[error("Query string is not valid UTF-8")]
    Encoding,
}

/// Parse `days`, `hours` and `date` from a query string (without the leading `?`).
/// Unknown parameters are ignored; a repeated parameter keeps its last value.
pub fn parse_calculate_query(query: &str) -> Result<BusinessRequest, RequestError> {
    let mut days = None;
    let mut hours = None;
    let mut date = None;

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key)?;
        let value = decode(value)?;
        match key.as_str() {
            "days" => days = Some(value),
            "hours" => hours = Some(value),
            "date" => date = Some(value),
            _ => {}
        }
    }

    if days.is_none() && hours.is_none() {
        return Err(RequestError::MissingCounts);
    }

    Ok(BusinessRequest {
        start: date.as_deref().map(parse_utc_instant).transpose()?,
        days: days.as_deref().map(|v| parse_count("days", v)).transpose()?,
        hours: hours.as_deref().map(|v| parse_count("hours", v)).transpose()?,
    })
}

/// Whole non-negative count; surrounding whitespace is tolerated
pub fn parse_count(name: &'static str, value: &str) -> Result<u32, RequestError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RequestError::InvalidCount(name));
    }
    value.parse().map_err(|_| RequestError::InvalidCount(name))
}

/// ISO-8601 instant that must be given in UTC with a `Z` suffix.
/// Full RFC 3339 is accepted, as is the shorter `YYYY-MM-DDTHH:MMZ` form.
pub fn parse_utc_instant(value: &str) -> Result<DateTime<Utc>, RequestError> {
    let Some(stripped) = value.strip_suffix('Z') else {
        return Err(RequestError::DateNotUtc);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|_| RequestError::InvalidDate)
}

fn decode(raw: &str) -> Result<String, RequestError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| RequestError::Encoding)
}
