/// Background holiday refresher
/// Keeps the cache warm so requests rarely wait on the holiday source

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::holidays::HolidayCache;

/// Format duration for logging
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Refresh the cache if its snapshot has expired. Returns false when the source failed.
pub async fn refresh_once(cache: &HolidayCache) -> bool {
    match cache.ensure_fresh().await {
        Ok(snapshot) => {
            debug!("Holiday cache holds {} dates", snapshot.holidays.len());
            true
        }
        Err(e) => {
            debug!("Scheduled refresh failed: {}", e);
            false
        }
    }
}

/// Run the refresher loop until cancelled
pub async fn run_refresher(cache: Arc<HolidayCache>, interval: Duration, cancel_token: CancellationToken) {
    info!(
        "Holiday refresher started (every {}, ttl {})",
        format_duration(interval),
        format_duration(cache.ttl())
    );

    loop {
        tokio::select! {
            _ = sleep(interval) => {
                refresh_once(&cache).await;
            }
            _ = cancel_token.cancelled() => {
                info!("Holiday refresher shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holidays::fake::FakeSource;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h 0m");
        assert_eq!(format_duration(Duration::from_secs(3660)), "1h 1m");
        assert_eq!(format_duration(Duration::from_secs(1800)), "30m");
        assert_eq!(format_duration(Duration::from_secs(86_400)), "24h 0m");
    }

    #[test]
    fn test_format_duration_edge_cases() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0m");
        assert_eq!(format_duration(Duration::from_secs(59)), "0m");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
    }

    #[tokio::test]
    async fn test_refresh_once_loads_and_skips_fresh() {
        let source = Arc::new(FakeSource::new(&["2025-12-25"]));
        let cache = HolidayCache::new(source.clone(), Duration::from_secs(3600));

        assert!(refresh_once(&cache).await);
        assert!(refresh_once(&cache).await);
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(cache.holiday_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_once_reports_failure() {
        let source = Arc::new(FakeSource::new(&[]));
        source.set_failing(true);
        let cache = HolidayCache::new(source, Duration::from_secs(3600));

        assert!(!refresh_once(&cache).await);
        assert!(cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_refresher_refetches_expired_cache() {
        let source = Arc::new(FakeSource::new(&["2025-12-25"]));
        let cache = Arc::new(HolidayCache::new(source.clone(), Duration::ZERO));
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_refresher(
            cache.clone(),
            Duration::from_millis(10),
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_token.cancel();

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("Refresher should stop within timeout")
            .expect("Refresher should complete without panic");

        assert!(source.fetch_count() >= 2);
        assert_eq!(cache.holiday_count(), 1);
    }

    #[tokio::test]
    async fn test_refresher_stops_immediately_on_cancel() {
        let source = Arc::new(FakeSource::new(&[]));
        let cache = Arc::new(HolidayCache::new(source.clone(), Duration::ZERO));
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        tokio::time::timeout(
            Duration::from_millis(500),
            run_refresher(cache, Duration::from_secs(3600), cancel_token),
        )
        .await
        .expect("Refresher should honor an already-cancelled token");

        assert_eq!(source.fetch_count(), 0);
    }
}
