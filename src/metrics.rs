//! Process-wide request counter used by the admin diagnostics page.
//!
//! Updated from every request-handling flow concurrently, so it is a single
//! atomic and never takes a lock.

use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_COUNTER: RequestCounter = RequestCounter::new();

/// The counter shared by the whole process.
pub fn request_counter() -> &'static RequestCounter {
    &REQUEST_COUNTER
}

/// Lock-free hit counter.
#[derive(Debug, Default)]
pub struct RequestCounter {
    hits: AtomicU64,
}

impl RequestCounter {
    /// Create a counter starting at zero.
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
        }
    }

    /// Count one request and return the new total.
    pub fn increment(&self) -> u64 {
        self.hits.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current total.
    pub fn get(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Reset to zero and return the total it held.
    pub fn reset(&self) -> u64 {
        self.hits.swap(0, Ordering::Relaxed)
    }
}
