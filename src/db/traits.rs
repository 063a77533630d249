// StateStore trait — backend-agnostic async interface for persisted state.
//
// Implementors: SqliteStore (wraps rusqlite), MemoryStore (tests / no-sqlite
// builds). Values come back raw; interpreting them (and recovering from a
// malformed one) is the caller's job, so one bad key never blocks the others.

use anyhow::Result;
use async_trait::async_trait;

use crate::state::{CategoryFilters, SeenEntry};

/// Everything persisted from a previous run. `None` means "never saved".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    /// JSON array of processed alerts (`{id, first_seen}` objects).
    pub processed_alerts: Option<String>,
    /// Peak users online at the time of the last save.
    pub max_users_online: Option<String>,
    /// JSON-encoded CategoryFilters.
    pub filters: Option<String>,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load whatever was saved last time.
    async fn load(&self) -> Result<PersistedState>;

    /// Save the dedup snapshot and current peak value together.
    async fn save_snapshot(
        &self,
        processed_alerts: &[SeenEntry],
        max_users_online: u64,
    ) -> Result<()>;

    /// Save the live-stream category filters.
    async fn save_filters(&self, filters: &CategoryFilters) -> Result<()>;

    /// When the snapshot was last saved, if ever.
    async fn last_saved_at(&self) -> Result<Option<String>>;
}
