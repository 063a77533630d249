// Ingestion pipeline: raw batch -> new alerts -> fan-out.
//
// For each alert in feed order:
// 1. Skip it if it has no id or no type (logged)
// 2. Skip it if the DedupStore has already seen the id
// 3. Classify and render it (outside any lock)
// 4. Hand it to the FanoutHub
// 5. Only then mark the id as seen
//
// Marking after dispatch means a crash in between can repeat an alert after
// restart, but never drop one.

use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::alerts::{classify_at, Alert};
use crate::hub::FanoutHub;
use crate::state::DedupStore;

/// What happened to one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub received: usize,
    pub dispatched: usize,
    pub duplicates: usize,
    pub malformed: usize,
}

pub struct IngestionPipeline {
    dedup: Arc<DedupStore>,
    hub: Arc<FanoutHub>,
    timestamps: bool,
    // Serializes whole batches so two overlapping ingests can't both pass the
    // has() check for the same id.
    batch_lock: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(dedup: Arc<DedupStore>, hub: Arc<FanoutHub>) -> Self {
        Self {
            dedup,
            hub,
            timestamps: true,
            batch_lock: Mutex::new(()),
        }
    }

    /// Whether rendered messages get an `[HH:MM:SS]` local-time prefix (default on).
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn dedup(&self) -> &Arc<DedupStore> {
        &self.dedup
    }

    pub fn hub(&self) -> &Arc<FanoutHub> {
        &self.hub
    }

    pub async fn ingest(&self, batch: Vec<Alert>) -> IngestReport {
        let _batch = self.batch_lock.lock().await;
        let mut report = IngestReport {
            received: batch.len(),
            ..IngestReport::default()
        };

        for alert in batch {
            let Some(id) = alert.id().map(str::to_string) else {
                warn!("Skipping alert without an id");
                report.malformed += 1;
                continue;
            };
            if alert.tag().is_none() {
                warn!(id = %id, "Skipping alert without a type");
                report.malformed += 1;
                continue;
            }
            if self.dedup.has(&id) {
                report.duplicates += 1;
                continue;
            }

            let at = self.timestamps.then(|| Local::now().time());
            match classify_at(&alert, at) {
                Ok((category, rendered)) => {
                    self.hub.dispatch(alert, category, rendered).await;
                    self.dedup.add(&id);
                    report.dispatched += 1;
                }
                Err(e) => {
                    // It will never render, so don't warn about it on every tick
                    warn!(error = %e, "Skipping alert that can't be rendered");
                    self.dedup.add(&id);
                    report.malformed += 1;
                }
            }
        }

        if report.dispatched > 0 || report.malformed > 0 {
            info!(
                received = report.received,
                new = report.dispatched,
                duplicates = report.duplicates,
                malformed = report.malformed,
                "Batch ingested"
            );
        }

        report
    }
}
