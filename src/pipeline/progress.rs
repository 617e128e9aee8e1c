//! Per-worker byte accounting for aggregate progress display.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate transfer progress, attributed per worker slot
///
/// Each worker adds the bytes it streams to its own slot; a failed attempt
/// rolls its bytes back so the aggregate only ever counts bytes that belong
/// to an attempt still in flight or completed.
#[derive(Debug)]
pub struct ProgressTracker {
    slots: Vec<AtomicU64>,
}

impl ProgressTracker {
    /// Create a tracker with one slot per worker
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Credit bytes to a worker's slot
    pub fn add(&self, slot: usize, bytes: u64) {
        if let Some(counter) = self.slots.get(slot) {
            counter.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    /// Remove a failed attempt's bytes from a worker's slot
    pub fn rollback(&self, slot: usize, bytes: u64) {
        if let Some(counter) = self.slots.get(slot) {
            counter.fetch_sub(bytes, Ordering::Relaxed);
        }
    }

    /// Bytes currently credited to one worker slot
    pub fn slot_bytes(&self, slot: usize) -> u64 {
        self.slots
            .get(slot)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Bytes currently credited across all slots
    pub fn total_bytes(&self) -> u64 {
        self.slots.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}
