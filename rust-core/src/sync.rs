//! Periodic hand-off of step counts to an external store.
//!
//! The engine only exposes a running count. Consumers that persist a daily
//! total need non-overlapping deltas instead; [`StepSyncCursor`] remembers
//! what was already handed off and produces the increments.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default time between syncs in milliseconds.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 30_000;

/// Steps to add to the external total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    /// Steps counted since the previous batch.
    pub steps: u64,
    /// Engine count at the time of this batch.
    pub total: u64,
    /// When the batch was taken.
    pub synced_at_ms: u64,
}

/// Tracks how much of the engine count has been synced.
///
/// A count lower than the synced value is taken as a fresh session. That
/// guess fails when the new session passes the old value before the next
/// poll, so call [`rebase`](Self::rebase) whenever the engine count is reset
/// or a session is started.
#[derive(Debug, Clone)]
pub struct StepSyncCursor {
    interval_ms: u64,
    synced_count: u64,
    last_sync_ms: Option<u64>,
}

impl StepSyncCursor {
    /// Cursor syncing every `interval_ms`.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            synced_count: 0,
            last_sync_ms: None,
        }
    }

    /// Whether a sync is due at `now_ms`.
    ///
    /// The first call anchors the interval.
    pub fn is_due(&mut self, now_ms: u64) -> bool {
        let last = *self.last_sync_ms.get_or_insert(now_ms);
        now_ms.saturating_sub(last) >= self.interval_ms
    }

    /// Produce a batch if the interval elapsed and the count grew.
    pub fn poll(&mut self, count: u64, now_ms: u64) -> Option<SyncBatch> {
        if !self.is_due(now_ms) {
            return None;
        }
        self.last_sync_ms = Some(now_ms);
        self.take(count, now_ms)
    }

    /// Hand off whatever is pending, regardless of the interval.
    pub fn flush(&mut self, count: u64, now_ms: u64) -> Option<SyncBatch> {
        self.last_sync_ms = Some(now_ms);
        self.take(count, now_ms)
    }

    /// Treat the engine count as starting again from zero.
    ///
    /// Steps counted before the reset and not yet synced are dropped; flush
    /// first to keep them.
    pub fn rebase(&mut self) {
        debug!(previous = self.synced_count, "sync baseline reset");
        self.synced_count = 0;
    }

    /// Count value covered by the batches so far.
    pub fn synced_count(&self) -> u64 {
        self.synced_count
    }

    fn take(&mut self, count: u64, now_ms: u64) -> Option<SyncBatch> {
        // A lower count means the engine restarted or was reset.
        let steps = if count < self.synced_count {
            count
        } else {
            count - self.synced_count
        };
        self.synced_count = count;

        if steps == 0 {
            return None;
        }
        debug!(steps, total = count, "steps synced");
        Some(SyncBatch {
            steps,
            total: count,
            synced_at_ms: now_ms,
        })
    }
}

impl Default for StepSyncCursor {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_INTERVAL_MS)
    }
}
