use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for log activity.
///
/// Producers and the consumer bump different counters, so the producer-side
/// and consumer-side groups sit on separate cache lines. All updates are
/// relaxed; snapshots are advisory.
#[derive(Debug, Default)]
pub struct Metrics {
    // === PRODUCER SIDE ===
    frames_appended: CachePadded<AtomicU64>,
    bytes_appended: AtomicU64,
    padding_frames: AtomicU64,
    claim_retries: AtomicU64,
    stall_unblocks: AtomicU64,
    rotations: AtomicU64,

    // === CONSUMER / BACKGROUND SIDE ===
    frames_polled: CachePadded<AtomicU64>,
    partitions_cleaned: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_appended: u64,
    pub bytes_appended: u64,
    pub padding_frames: u64,
    pub claim_retries: u64,
    pub stall_unblocks: u64,
    pub rotations: u64,
    pub frames_polled: u64,
    pub partitions_cleaned: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_frames_appended(&self, n: u64) {
        self.frames_appended.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_bytes_appended(&self, n: u64) {
        self.bytes_appended.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_padding_frames(&self, n: u64) {
        self.padding_frames.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_claim_retries(&self, n: u64) {
        self.claim_retries.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_stall_unblocks(&self, n: u64) {
        self.stall_unblocks.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_rotations(&self, n: u64) {
        self.rotations.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_frames_polled(&self, n: u64) {
        self.frames_polled.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_partitions_cleaned(&self, n: u64) {
        self.partitions_cleaned.fetch_add(n, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_appended: self.frames_appended.load(Ordering::Relaxed),
            bytes_appended: self.bytes_appended.load(Ordering::Relaxed),
            padding_frames: self.padding_frames.load(Ordering::Relaxed),
            claim_retries: self.claim_retries.load(Ordering::Relaxed),
            stall_unblocks: self.stall_unblocks.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            frames_polled: self.frames_polled.load(Ordering::Relaxed),
            partitions_cleaned: self.partitions_cleaned.load(Ordering::Relaxed),
        }
    }
}
