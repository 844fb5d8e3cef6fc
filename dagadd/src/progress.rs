use dagadd_core::ProgressFn;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Turns per-event byte counts into a running total.
///
/// One accumulator lives for exactly one add. The caller's callback sees
/// the cumulative number of bytes processed so far, never a delta.
pub struct ProgressAccumulator {
    total: AtomicU64,
    callback: ProgressFn,
}

impl ProgressAccumulator {
    pub fn new(callback: ProgressFn) -> Self {
        Self {
            total: AtomicU64::new(0),
            callback,
        }
    }

    /// Adds `bytes` to the total and reports the new total.
    pub fn record(&self, bytes: u64) -> u64 {
        let total = self.total.fetch_add(bytes, Ordering::SeqCst) + bytes;
        (self.callback)(total);
        total
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Wraps the accumulator into a callback for the importer.
    pub fn into_callback(self) -> ProgressFn {
        let acc = Arc::new(self);
        Arc::new(move |bytes| {
            acc.record(bytes);
        })
    }
}

impl std::fmt::Debug for ProgressAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAccumulator")
            .field("total", &self.total())
            .finish()
    }
}
