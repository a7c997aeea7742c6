use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Callback invoked with `(completed_bytes, total_bytes)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Shared byte counter for one transfer.
///
/// Cloned into every task working on the same file; each task adds what it
/// moved and the callback sees the running total.
#[derive(Clone)]
pub struct ProgressCounter {
    completed: Arc<AtomicU64>,
    total: u64,
    callback: Option<ProgressCallback>,
}

impl ProgressCounter {
    pub fn new(total: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(0)),
            total,
            callback,
        }
    }

    /// A counter that only counts.
    pub fn silent(total: u64) -> Self {
        Self::new(total, None)
    }

    /// Adds `bytes` and notifies the callback. Returns the new total.
    pub fn add(&self, bytes: u64) -> u64 {
        let completed = self.completed.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if let Some(cb) = &self.callback {
            cb(completed, self.total);
        }
        completed
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total
    }
}
