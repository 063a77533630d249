// SqliteStore — rusqlite backend implementing the StateStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across an .await on anything else.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::queries::{self, KEY_FILTERS, KEY_LAST_SAVED_AT, KEY_MAX_USERS_ONLINE, KEY_PROCESSED_ALERTS};
use super::traits::{PersistedState, StateStore};
use crate::state::{CategoryFilters, SeenEntry};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection (schema must exist).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load(&self) -> Result<PersistedState> {
        let conn = self.conn.lock().await;
        Ok(PersistedState {
            processed_alerts: queries::get_state(&conn, KEY_PROCESSED_ALERTS)?,
            max_users_online: queries::get_state(&conn, KEY_MAX_USERS_ONLINE)?,
            filters: queries::get_state(&conn, KEY_FILTERS)?,
        })
    }

    async fn save_snapshot(
        &self,
        processed_alerts: &[SeenEntry],
        max_users_online: u64,
    ) -> Result<()> {
        let json = serde_json::to_string(processed_alerts)?;
        let saved_at = chrono::Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().await;
        queries::save_snapshot(&mut conn, &json, max_users_online, &saved_at)
    }

    async fn save_filters(&self, filters: &CategoryFilters) -> Result<()> {
        let json = serde_json::to_string(filters)?;
        let conn = self.conn.lock().await;
        queries::set_state(&conn, KEY_FILTERS, &json)
    }

    async fn last_saved_at(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_state(&conn, KEY_LAST_SAVED_AT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    fn store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteStore::new(conn)
    }

    #[tokio::test]
    async fn test_fresh_store_loads_nothing() {
        let store = store();
        assert_eq!(store.load().await.unwrap(), PersistedState::default());
        assert_eq!(store.last_saved_at().await.unwrap(), None);
        assert_eq!(store.table_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_and_filters_survive() {
        let store = store();
        let first_seen = chrono::Utc::now();
        let entries = vec![
            SeenEntry { id: "a1".to_string(), first_seen },
            SeenEntry { id: "a2".to_string(), first_seen },
        ];
        store.save_snapshot(&entries, 17).await.unwrap();
        store.save_filters(&CategoryFilters::all()).await.unwrap();

        let state = store.load().await.unwrap();
        let saved: Vec<SeenEntry> =
            serde_json::from_str(state.processed_alerts.as_deref().unwrap()).unwrap();
        assert_eq!(saved, entries);
        assert_eq!(state.max_users_online.as_deref(), Some("17"));
        let filters: CategoryFilters =
            serde_json::from_str(state.filters.as_deref().unwrap()).unwrap();
        assert_eq!(filters, CategoryFilters::all());
        assert!(store.last_saved_at().await.unwrap().is_some());
    }
}
