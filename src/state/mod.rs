// In-memory shared state: the dedup set, the peak counter, and the
// category filters. Each type carries its own synchronization so it can be
// wrapped in an Arc and handed to whoever needs it.

pub mod dedup;
pub mod filters;
pub mod peak;

pub use dedup::{DedupStore, SeenEntry};
pub use filters::{CategoryFilters, FilterStore};
pub use peak::PeakCounter;
