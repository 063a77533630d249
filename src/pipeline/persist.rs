// Restoring and saving state through the StateStore.
//
// Every failure here degrades instead of aborting: a store that can't be
// read means starting empty, a save that fails is retried on the next tick.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::db::StateStore;
use crate::error::WatchError;
use crate::state::{CategoryFilters, DedupStore, FilterStore, PeakCounter};

/// Load the previous run's state into fresh components.
///
/// Each value is recovered independently: a malformed dedup snapshot doesn't
/// stop the peak or the filters from loading.
pub async fn restore(
    store: &dyn StateStore,
    dedup: &DedupStore,
    peak: &PeakCounter,
    filters: &FilterStore,
) {
    let state = match store.load().await {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "Could not read persisted state, starting empty");
            return;
        }
    };

    if let Some(raw) = state.processed_alerts.as_deref() {
        let loaded = dedup.load_snapshot(raw);
        info!(ids = loaded, "Dedup snapshot restored");
    }

    if let Some(raw) = state.max_users_online.as_deref() {
        match raw.trim().parse::<i64>() {
            Ok(value) => {
                if let Err(e) = peak.observe(value) {
                    warn!(error = %e, "Persisted peak rejected, starting at zero");
                }
            }
            Err(e) => warn!(error = %e, raw, "Persisted peak is malformed, starting at zero"),
        }
    }

    if let Some(raw) = state.filters.as_deref() {
        match serde_json::from_str::<CategoryFilters>(raw) {
            Ok(saved) => filters.replace(saved),
            Err(e) => warn!(error = %e, "Persisted filters are malformed, using defaults"),
        }
    }
}

/// Prune expired dedup ids, then save the dedup snapshot and current peak.
///
/// `retention` of None keeps every id forever.
pub async fn save(
    store: &dyn StateStore,
    dedup: &DedupStore,
    peak: &PeakCounter,
    retention: Option<Duration>,
) -> Result<()> {
    if let Some(retention) = retention {
        let pruned = dedup.prune_older_than(Utc::now() - retention);
        if pruned > 0 {
            info!(pruned, "Pruned expired dedup ids");
        }
    }

    let entries = dedup.entries();
    store
        .save_snapshot(&entries, peak.current())
        .await
        .map_err(|e| WatchError::Persistence(format!("{e:#}")))
        .context("Failed to save state snapshot")?;
    debug!(ids = entries.len(), "State snapshot saved");
    Ok(())
}

/// Replace the live filters and persist them.
pub async fn update_filters(
    store: &dyn StateStore,
    filters: &FilterStore,
    new_filters: CategoryFilters,
) -> Result<()> {
    filters.replace(new_filters);
    store
        .save_filters(&new_filters)
        .await
        .map_err(|e| WatchError::Persistence(format!("{e:#}")))
        .context("Failed to save filters")?;
    info!(enabled = ?new_filters.enabled(), "Filters updated");
    Ok(())
}
