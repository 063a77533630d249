// Pipelines — ingestion of alert batches, plus the small jobs the scheduler
// runs: fetch, sample users, report the peak, persist state.

pub mod ingest;
pub mod jobs;
pub mod persist;

pub use ingest::{IngestReport, IngestionPipeline};
