// MemoryStore — StateStore that lives and dies with the process.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{PersistedState, StateStore};
use crate::state::{CategoryFilters, SeenEntry};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistedState>,
    saved_at: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw values, as if a previous run had saved them.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
            saved_at: Mutex::new(None),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.state.lock().await.clone())
    }

    async fn save_snapshot(
        &self,
        processed_alerts: &[SeenEntry],
        max_users_online: u64,
    ) -> Result<()> {
        let json = serde_json::to_string(processed_alerts)?;
        let mut state = self.state.lock().await;
        state.processed_alerts = Some(json);
        state.max_users_online = Some(max_users_online.to_string());
        drop(state);
        *self.saved_at.lock().await = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    async fn save_filters(&self, filters: &CategoryFilters) -> Result<()> {
        self.state.lock().await.filters = Some(serde_json::to_string(filters)?);
        Ok(())
    }

    async fn last_saved_at(&self) -> Result<Option<String>> {
        Ok(self.saved_at.lock().await.clone())
    }
}
