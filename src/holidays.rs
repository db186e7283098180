//! Holiday cache
//!
//! Holds the set of public holidays fetched from an external source. The set is
//! swapped wholesale on every successful refresh: readers take an `Arc` to an
//! immutable snapshot, so one calculation always sees one consistent set.
//! A failed refresh leaves the previous snapshot in place.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default holiday source
pub const DEFAULT_HOLIDAYS_URL: &str = "https://content.capta.co/Recruitment/WorkingDays.json";

/// How long a fetched holiday set stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bound on a single outbound fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum HolidayFetchError {
    #[error("holiday request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("holiday source returned status {0}")]
    Status(u16),

    #[error("holiday payload is not a JSON array of date strings: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("holiday payload contains an invalid date: {0:?}")]
    InvalidDate(String),
}

/// Set of non-working calendar dates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet {
    dates: HashSet<NaiveDate>,
}

impl HolidaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `YYYY-MM-DD` strings; any malformed entry rejects the whole list
    pub fn parse<I, S>(entries: I) -> Result<Self, HolidayFetchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dates = HashSet::new();
        for entry in entries {
            let entry = entry.as_ref();
            let date = NaiveDate::parse_from_str(entry.trim(), "%Y-%m-%d")
                .map_err(|_| HolidayFetchError::InvalidDate(entry.to_string()))?;
            dates.insert(date);
        }
        Ok(Self { dates })
    }

    /// Parse the raw JSON body served by the holiday source
    pub fn from_json(body: &[u8]) -> Result<Self, HolidayFetchError> {
        let entries: Vec<String> = serde_json::from_slice(body)?;
        Self::parse(entries)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<NaiveDate> for HolidaySet {
    fn from_iter<T: IntoIterator<Item = NaiveDate>>(iter: T) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

/// An immutable, point-in-time copy of the holiday set
#[derive(Debug)]
pub struct HolidaySnapshot {
    pub holidays: HolidaySet,
    pub fetched_at: Instant,
}

impl HolidaySnapshot {
    fn is_fresh_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// Where holiday data comes from
#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn fetch(&self) -> Result<HolidaySet, HolidayFetchError>;
}

/// Fetches a JSON array of ISO dates over HTTP
pub struct HttpHolidaySource {
    client: reqwest::Client,
    url: String,
}

impl HttpHolidaySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, HolidayFetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HolidaySource for HttpHolidaySource {
    async fn fetch(&self) -> Result<HolidaySet, HolidayFetchError> {
        debug!("Fetching holidays from {}", self.url);

        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HolidayFetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        HolidaySet::from_json(&body)
    }
}

/// Cached holiday set with a time-to-live
pub struct HolidayCache {
    source: Arc<dyn HolidaySource>,
    ttl: Duration,
    current: RwLock<Option<Arc<HolidaySnapshot>>>,
}

impl HolidayCache {
    pub fn new(source: Arc<dyn HolidaySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            current: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Refresh from the source if nothing is loaded or the data is older than the TTL.
    /// Returns the snapshot now in effect.
    pub async fn ensure_fresh(&self) -> Result<Arc<HolidaySnapshot>, HolidayFetchError> {
        self.ensure_fresh_at(Instant::now()).await
    }

    /// Testable version: freshness judged against the given instant
    pub async fn ensure_fresh_at(&self, now: Instant) -> Result<Arc<HolidaySnapshot>, HolidayFetchError> {
        if let Some(snapshot) = self.snapshot() {
            if snapshot.is_fresh_at(now, self.ttl) {
                return Ok(snapshot);
            }
            debug!("Holiday cache expired, refreshing");
        }

        match self.source.fetch().await {
            Ok(holidays) => {
                let snapshot = Arc::new(HolidaySnapshot {
                    holidays,
                    fetched_at: now,
                });
                self.store(snapshot.clone());
                info!("Holiday cache refreshed: {} dates", snapshot.holidays.len());
                Ok(snapshot)
            }
            Err(e) => {
                if self.snapshot().is_some() {
                    warn!("Holiday refresh failed, keeping previous data: {}", e);
                } else {
                    warn!("Holiday refresh failed and no data is loaded: {}", e);
                }
                Err(e)
            }
        }
    }

    /// The current snapshot, if any data has ever been loaded
    pub fn snapshot(&self) -> Option<Arc<HolidaySnapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether the calendar date of `civil` is a holiday in the current set.
    /// `None` when nothing has ever been loaded; callers must not read that as
    /// "not a holiday".
    pub fn is_holiday(&self, civil: NaiveDateTime) -> Option<bool> {
        self.snapshot().map(|s| s.holidays.contains(civil.date()))
    }

    pub fn holiday_count(&self) -> usize {
        self.snapshot().map_or(0, |s| s.holidays.len())
    }

    /// Time since the last successful refresh
    pub fn last_refresh_age(&self) -> Option<Duration> {
        self.snapshot().map(|s| s.fetched_at.elapsed())
    }

    fn store(&self, snapshot: Arc<HolidaySnapshot>) {
        match self.current.write() {
            Ok(mut guard) => *guard = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }
}




/// State machine model of the cache lifecycle.
/// Every state is produced by replaying its action history against a real
/// `HolidayCache`, so the properties check observed cache behavior.
#[cfg(test)]
mod state_machine {
    use super::fake::FakeSource;
    use super::*;
    use stateright::*;

    const TTL: Duration = Duration::from_secs(60);

    #[derive(Clone, Copy, Debug, Hash, PartialEq)]
    enum Action {
        FetchOk,
        FetchFail,
        Expire,
    }

    #[derive(Clone, Debug, Hash, PartialEq)]
    struct CacheState {
        history: Vec<Action>,
        /// A snapshot is present
        loaded: bool,
        /// The snapshot is within its TTL
        fresh: bool,
        /// Distinct snapshots installed so far
        generation: u8,
        /// Successful source fetches so far
        fetches_ok: u8,
        /// A fetch attempt happened while the snapshot was still fresh
        fetched_while_fresh: bool,
        /// Outcome a calculation would see right now
        lookup_ok: bool,
    }

    fn replay(history: Vec<Action>) -> CacheState {
        let source = Arc::new(FakeSource::new(&["2025-04-17"]));
        let cache = HolidayCache::new(source.clone(), TTL);
        let start = Instant::now();
        let mut now = start;

        let mut generation = 0u8;
        let mut fetches_ok = 0u8;
        let mut fetched_while_fresh = false;
        let mut lookup_ok = false;
        let holiday = NaiveDate::from_ymd_opt(2025, 4, 17)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();

        for action in &history {
            match action {
                Action::Expire => {
                    now += TTL;
                    continue;
                }
                Action::FetchOk => source.set_failing(false),
                Action::FetchFail => source.set_failing(true),
            }

            let before = cache.snapshot();
            let was_fresh = before.as_ref().is_some_and(|s| s.is_fresh_at(now, TTL));
            let fetches_before = source.fetch_count();

            let result = tokio_test::block_on(cache.ensure_fresh_at(now));

            let fetched = source.fetch_count() > fetches_before;
            if fetched && was_fresh {
                fetched_while_fresh = true;
            }
            if fetched && result.is_ok() {
                fetches_ok += 1;
            }
            let after = cache.snapshot();
            let replaced = match (&before, &after) {
                (Some(b), Some(a)) => !Arc::ptr_eq(b, a),
                (None, Some(_)) => true,
                _ => false,
            };
            if replaced {
                generation += 1;
            }
            // Fresh data, else any stale snapshot, answers the lookup
            lookup_ok = cache.is_holiday(holiday) == Some(true);
            assert_eq!(lookup_ok, result.is_ok() || after.is_some());
        }

        let snapshot = cache.snapshot();
        CacheState {
            history,
            loaded: snapshot.is_some(),
            fresh: snapshot.as_ref().is_some_and(|s| s.is_fresh_at(now, TTL)),
            generation,
            fetches_ok,
            fetched_while_fresh,
            lookup_ok,
        }
    }

    struct CacheModel {
        max_steps: usize,
    }

    impl Model for CacheModel {
        type State = CacheState;
        type Action = Action;

        fn init_states(&self) -> Vec<Self::State> {
            vec![replay(Vec::new())]
        }

        fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
            if state.history.len() >= self.max_steps {
                return;
            }
            actions.push(Action::FetchOk);
            actions.push(Action::FetchFail);
            actions.push(Action::Expire);
        }

        fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
            let mut history = state.history.clone();
            history.push(action);
            Some(replay(history))
        }

        fn properties(&self) -> Vec<Property<Self>> {
            vec![
                Property::always("fail_closed_without_data", |_: &Self, s: &CacheState| {
                    s.loaded || !s.lookup_ok
                }),
                Property::always("fresh_implies_loaded", |_: &Self, s: &CacheState| {
                    !s.fresh || s.loaded
                }),
                Property::always("snapshot_per_successful_fetch", |_: &Self, s: &CacheState| {
                    s.generation == s.fetches_ok && (s.generation > 0) == s.loaded
                }),
                Property::always("no_fetch_while_fresh", |_: &Self, s: &CacheState| {
                    !s.fetched_while_fresh
                }),
                Property::sometimes("stale_data_used", |_: &Self, s: &CacheState| {
                    s.loaded && !s.fresh && s.lookup_ok
                }),
                Property::sometimes("fail_closed_reached", |_: &Self, s: &CacheState| {
                    !s.loaded && !s.history.is_empty() && !s.lookup_ok
                }),
            ]
        }
    }

    #[test]
    fn test_cache_lifecycle_properties() {
        let model = CacheModel { max_steps: 5 };
        model
            .checker()
            .threads(1)
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_cache_lifecycle_explores_states() {
        let model = CacheModel { max_steps: 3 };
        let checker = model.checker().threads(1).spawn_bfs().join();
        assert!(checker.state_count() > 1, "Should explore multiple states");
    }

    #[test]
    fn test_replay_stale_after_failed_refresh() {
        let state = replay(vec![Action::FetchOk, Action::Expire, Action::FetchFail]);
        assert!(state.loaded);
        assert!(!state.fresh);
        assert!(state.lookup_ok);
        assert_eq!(state.generation, 1);
    }
}
