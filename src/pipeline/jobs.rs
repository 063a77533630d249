// Scheduled job bodies. Each one is a single tick's worth of work; the
// scheduler decides when they run and logs whatever error they return.

use anyhow::Result;
use tracing::{debug, info};

use super::ingest::{IngestReport, IngestionPipeline};
use crate::feed::{AlertFeed, UserCountFeed};
use crate::hub::FanoutHub;
use crate::state::PeakCounter;

/// Fetch one alert batch and ingest it. A feed failure skips the tick.
pub async fn fetch_alerts(
    feed: &dyn AlertFeed,
    pipeline: &IngestionPipeline,
) -> Result<IngestReport> {
    let batch = feed.fetch_alerts().await?;
    debug!(alerts = batch.len(), "Alert batch fetched");
    Ok(pipeline.ingest(batch).await)
}

/// Sample the users-online count into the peak counter.
pub async fn sample_users(feed: &dyn UserCountFeed, peak: &PeakCounter) -> Result<i64> {
    let count = feed.fetch_users_online().await?;
    peak.observe(count)?;
    debug!(count, peak = peak.current(), "Users online sampled");
    Ok(count)
}

/// Render the users report line.
pub fn users_report(peak: u64) -> String {
    format!("{peak} wazers online 🚙 🚕 🚚")
}

/// Take the peak and push a summary if anyone was seen. Returns the peak taken.
pub async fn report_peak(peak: &PeakCounter, hub: &FanoutHub) -> u64 {
    let value = peak.take_and_reset();
    if value > 0 {
        info!(peak = value, "Sending users report");
        hub.push_text(users_report(value)).await;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Alert;
    use crate::error::WatchError;
    use crate::state::DedupStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct FixedCount(i64);

    #[async_trait]
    impl UserCountFeed for FixedCount {
        async fn fetch_users_online(&self) -> Result<i64> {
            Ok(self.0)
        }
    }

    struct DownFeed;

    #[async_trait]
    impl AlertFeed for DownFeed {
        async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
            Err(WatchError::TransientFetch("connection refused".to_string()).into())
        }
    }

    struct OneBatch;

    #[async_trait]
    impl AlertFeed for OneBatch {
        async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
            Ok(vec![Alert::from_value(json!({"uuid": "a1", "type": "JAM"})).unwrap()])
        }
    }

    fn pipeline() -> IngestionPipeline {
        IngestionPipeline::new(Arc::new(DedupStore::new()), Arc::new(FanoutHub::new(None)))
    }

    #[tokio::test]
    async fn test_sample_feeds_peak() {
        let peak = PeakCounter::new();
        sample_users(&FixedCount(12), &peak).await.unwrap();
        sample_users(&FixedCount(7), &peak).await.unwrap();
        assert_eq!(peak.current(), 12);
    }

    #[tokio::test]
    async fn test_negative_sample_is_rejected() {
        let peak = PeakCounter::with_value(3);
        let err = sample_users(&FixedCount(-5), &peak).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WatchError>(),
            Some(WatchError::InvalidSample(-5))
        ));
        assert_eq!(peak.current(), 3);
    }

    #[tokio::test]
    async fn test_feed_failure_skips_tick() {
        let p = pipeline();
        let err = fetch_alerts(&DownFeed, &p).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WatchError>(),
            Some(WatchError::TransientFetch(_))
        ));
        assert!(p.hub().log().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_then_refetch_is_idempotent() {
        let p = pipeline();
        assert_eq!(fetch_alerts(&OneBatch, &p).await.unwrap().dispatched, 1);
        assert_eq!(fetch_alerts(&OneBatch, &p).await.unwrap().duplicates, 1);
        assert_eq!(p.hub().log().len(), 1);
    }

    #[tokio::test]
    async fn test_report_resets_peak() {
        let hub = FanoutHub::new(None);
        let peak = PeakCounter::with_value(30);
        assert_eq!(report_peak(&peak, &hub).await, 30);
        assert_eq!(report_peak(&peak, &hub).await, 0);
        assert_eq!(users_report(30), "30 wazers online 🚙 🚕 🚚");
    }
}
