//! Active sync session: the owner of the ingestion watermarks.
//!
//! Ingestors only ever *forward* a candidate watermark (the newest timestamp of the current
//! batch). The session keeps the running maximum, so forwarding an older value is a no-op and
//! re-delivered batches can never move a watermark backwards.

use std::sync::atomic::{AtomicI64, Ordering};

/// Callbacks into the active sync session.
pub trait SyncSession: Send + Sync {
    fn advance_reading_watermark(&self, timestamp: i64);
    fn advance_treatment_watermark(&self, timestamp: i64);
    /// A profile store created at `created_at` was accepted.
    fn profile_received(&self, created_at: i64);
}

/// Watermark counters kept in atomics.
///
/// All three values start at 0 ("nothing received yet").
#[derive(Debug, Default)]
pub struct Watermarks {
    latest_reading: AtomicI64,
    latest_treatment: AtomicI64,
    latest_profile: AtomicI64,
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously persisted values.
    pub fn resume(latest_reading: i64, latest_treatment: i64) -> Self {
        Self {
            latest_reading: AtomicI64::new(latest_reading),
            latest_treatment: AtomicI64::new(latest_treatment),
            latest_profile: AtomicI64::new(0),
        }
    }

    pub fn latest_reading(&self) -> i64 {
        self.latest_reading.load(Ordering::SeqCst)
    }

    pub fn latest_treatment(&self) -> i64 {
        self.latest_treatment.load(Ordering::SeqCst)
    }

    /// Creation timestamp of the last accepted profile store, 0 if none.
    pub fn latest_profile(&self) -> i64 {
        self.latest_profile.load(Ordering::SeqCst)
    }
}

impl SyncSession for Watermarks {
    fn advance_reading_watermark(&self, timestamp: i64) {
        let _ = self.latest_reading.fetch_max(timestamp, Ordering::SeqCst);
    }

    fn advance_treatment_watermark(&self, timestamp: i64) {
        let _ = self.latest_treatment.fetch_max(timestamp, Ordering::SeqCst);
    }

    fn profile_received(&self, created_at: i64) {
        self.latest_profile.store(created_at, Ordering::SeqCst);
    }
}
