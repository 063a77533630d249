// Error taxonomy for the ingestion side of the system.
//
// Glue code (CLI, web, collaborators) uses anyhow. These variants exist for
// the conditions a caller has to tell apart: a bad tick, a bad record, a bad
// sample, or a persistence hiccup. None of them is fatal to the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// Feed or sink unreachable, or answered with a non-success status.
    #[error("transient fetch failure: {0}")]
    TransientFetch(String),

    /// Response arrived but didn't have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A single alert record is missing fields it needs.
    #[error("malformed alert {id}: {reason}")]
    MalformedAlert { id: String, reason: String },

    /// A negative user count was offered to the peak counter.
    #[error("invalid sample: {0} is negative")]
    InvalidSample(i64),

    /// Snapshot save/load failed.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl WatchError {
    pub(crate) fn malformed_alert(id: &str, reason: impl Into<String>) -> Self {
        WatchError::MalformedAlert {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
