// DedupStore — the set of alert identifiers we've already processed.
//
// Each id remembers when it was first seen so the persistence job can prune
// entries past the retention window. First-seen times are persisted with the
// ids, so the window keeps counting across restarts. Nothing in the
// steady-state pipeline ever removes an id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One persisted dedup entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenEntry {
    pub id: String,
    pub first_seen: DateTime<Utc>,
}

/// Snapshots are arrays of entries; a bare array of ids (older format) is
/// still accepted, stamped as seen at load time.
#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Entries(Vec<SeenEntry>),
    Ids(Vec<String>),
}

/// Parse a JSON dedup snapshot in either format.
pub fn parse_snapshot(raw: &str) -> Result<Vec<SeenEntry>, serde_json::Error> {
    Ok(match serde_json::from_str::<Snapshot>(raw)? {
        Snapshot::Entries(entries) => entries,
        Snapshot::Ids(ids) => {
            let now = Utc::now();
            ids.into_iter()
                .map(|id| SeenEntry { id, first_seen: now })
                .collect()
        }
    })
}

#[derive(Debug, Default)]
pub struct DedupStore {
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Mark an id as seen. Adding an id that's already present is a no-op
    /// and keeps its original first-seen time.
    pub fn add(&self, id: &str) {
        self.add_at(id, Utc::now());
    }

    pub fn add_at(&self, id: &str, seen_at: DateTime<Utc>) {
        self.lock().entry(id.to_string()).or_insert(seen_at);
    }

    /// Administrative removal of a single id. Returns true if it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Drop every id first seen before `cutoff`. Returns how many were removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut seen = self.lock();
        let before = seen.len();
        seen.retain(|_, seen_at| *seen_at >= cutoff);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All ids ordered by first-seen time, then by id.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries().into_iter().map(|entry| entry.id).collect()
    }

    /// Ids with their first-seen times, in `snapshot` order.
    pub fn entries(&self) -> Vec<SeenEntry> {
        let mut entries: Vec<(DateTime<Utc>, String)> = self
            .lock()
            .iter()
            .map(|(id, seen_at)| (*seen_at, id.clone()))
            .collect();
        entries.sort();
        entries
            .into_iter()
            .map(|(first_seen, id)| SeenEntry { id, first_seen })
            .collect()
    }

    /// Bulk-insert ids from a previous snapshot, stamped as seen now.
    pub fn load<I>(&self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let now = Utc::now();
        let mut seen = self.lock();
        for id in ids {
            seen.entry(id).or_insert(now);
        }
    }

    /// Bulk-insert entries keeping their recorded first-seen times.
    pub fn load_entries<I>(&self, entries: I)
    where
        I: IntoIterator<Item = SeenEntry>,
    {
        let mut seen = self.lock();
        for entry in entries {
            seen.entry(entry.id).or_insert(entry.first_seen);
        }
    }

    /// Load a JSON-encoded snapshot (see `parse_snapshot`).
    ///
    /// Malformed input leaves the store empty and logs a warning. Returns the
    /// number of ids loaded.
    pub fn load_snapshot(&self, raw: &str) -> usize {
        match parse_snapshot(raw) {
            Ok(entries) => {
                self.load_entries(entries);
                self.len()
            }
            Err(e) => {
                warn!(error = %e, "Dedup snapshot is malformed, starting with an empty set");
                self.lock().clear();
                0
            }
        }
    }
}
