// Database queries — every SQL statement the state store runs lives here.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub const KEY_PROCESSED_ALERTS: &str = "processed_alerts";
pub const KEY_MAX_USERS_ONLINE: &str = "max_users_online";
pub const KEY_FILTERS: &str = "filters";
pub const KEY_LAST_SAVED_AT: &str = "last_saved_at";

/// Get a state value by key.
pub fn get_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM watch_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a state value (upsert).
pub fn set_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO watch_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Write the dedup snapshot, the peak and the save timestamp in one transaction,
/// so a reader never sees a snapshot from one save paired with a peak from another.
pub fn save_snapshot(
    conn: &mut Connection,
    processed_alerts_json: &str,
    max_users_online: u64,
    saved_at: &str,
) -> Result<()> {
    let tx = conn.transaction()?;
    set_state(&tx, KEY_PROCESSED_ALERTS, processed_alerts_json)?;
    set_state(&tx, KEY_MAX_USERS_ONLINE, &max_users_online.to_string())?;
    set_state(&tx, KEY_LAST_SAVED_AT, saved_at)?;
    tx.commit()?;
    Ok(())
}
