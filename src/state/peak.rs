// PeakCounter — highest concurrent-user sample since the last report.
//
// Backed by a single atomic: `observe` is a fetch_max and `take_and_reset`
// is a swap with zero, so a sample is either in the value that gets taken
// or lands in the next cycle, never lost in between.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::WatchError;

#[derive(Debug, Default)]
pub struct PeakCounter {
    peak: AtomicU64,
}

impl PeakCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously persisted value.
    pub fn with_value(value: u64) -> Self {
        Self {
            peak: AtomicU64::new(value),
        }
    }

    /// Raise the stored peak to `sample` if it is larger.
    /// Negative samples are rejected and leave the counter untouched.
    pub fn observe(&self, sample: i64) -> Result<(), WatchError> {
        let value = u64::try_from(sample).map_err(|_| WatchError::InvalidSample(sample))?;
        self.peak.fetch_max(value, Ordering::AcqRel);
        Ok(())
    }

    /// Read the current peak and reset it to zero in one step.
    pub fn take_and_reset(&self) -> u64 {
        self.peak.swap(0, Ordering::AcqRel)
    }

    pub fn current(&self) -> u64 {
        self.peak.load(Ordering::Acquire)
    }
}
