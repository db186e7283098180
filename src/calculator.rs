//! Business-time calculation
//!
//! Ensures holiday data is loaded, projects the start instant onto regional civil
//! time, normalizes it backward onto working time, then adds working days followed
//! by working hours and projects the result back to UTC.

use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::advance::{add_working_days, add_working_hours};
use crate::calendar::BusinessCalendar;
use crate::clock;
use crate::holidays::{HolidayCache, HolidayFetchError, HolidaySnapshot};
use crate::normalize::normalize;

#[derive(Debug, Error)]
pub enum CalculateError {
    #[error("holiday data unavailable: {0}")]
    Holidays(#[from] HolidayFetchError),

    #[error("result is outside the supported date range")]
    OutOfRange,
}

/// A business-time query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusinessRequest {
    /// Start instant; None means now
    pub start: Option<DateTime<Utc>>,
    pub days: Option<u32>,
    pub hours: Option<u32>,
}

pub struct Calculator {
    cache: Arc<HolidayCache>,
}

impl Calculator {
    pub fn new(cache: Arc<HolidayCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<HolidayCache> {
        &self.cache
    }

    pub async fn calculate(&self, request: BusinessRequest) -> Result<DateTime<Utc>, CalculateError> {
        let snapshot = self.holidays().await?;
        let start = request.start.unwrap_or_else(Utc::now);
        compute(&snapshot, start, request.days, request.hours)
    }

    /// Fresh holiday data, or the previous snapshot if a refresh fails.
    /// Fails closed when nothing has ever been loaded.
    async fn holidays(&self) -> Result<Arc<HolidaySnapshot>, CalculateError> {
        match self.cache.ensure_fresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match self.cache.snapshot() {
                Some(stale) => {
                    // The cache has already warned about the failed refresh
                    debug!("Using stale holiday data: {}", e);
                    Ok(stale)
                }
                None => Err(e.into()),
            },
        }
    }
}

/// Pure calculation over a fixed holiday snapshot.
///
/// The start is truncated to the whole regional minute before anything else,
/// so seconds and milliseconds never carry into the result
/// (`2025-01-20T14:15:30Z` + 1 day gives `2025-01-21T14:15:00Z`). This keeps an
/// hour addition from ending inside lunch and makes every result minute-aligned.
pub fn compute(
    snapshot: &HolidaySnapshot,
    start: DateTime<Utc>,
    days: Option<u32>,
    hours: Option<u32>,
) -> Result<DateTime<Utc>, CalculateError> {
    let calendar = BusinessCalendar::new(&snapshot.holidays);

    let civil = truncate_to_minute(clock::to_regional(start))?;
    let mut current = normalize(&calendar, civil).ok_or(CalculateError::OutOfRange)?;
    debug!("Normalized {} to {}", civil, current);

    if let Some(days) = days.filter(|d| *d > 0) {
        current = add_working_days(&calendar, current, days).ok_or(CalculateError::OutOfRange)?;
    }

    if let Some(hours) = hours.filter(|h| *h > 0) {
        current = add_working_hours(&calendar, current, hours).ok_or(CalculateError::OutOfRange)?;
    }

    clock::to_utc(current).ok_or(CalculateError::OutOfRange)
}

/// Calculations work in whole minutes
fn truncate_to_minute(civil: NaiveDateTime) -> Result<NaiveDateTime, CalculateError> {
    civil
        .duration_trunc(TimeDelta::minutes(1))
        .map_err(|_| CalculateError::OutOfRange)
}
