//! Engine counters
//!
//! Counts what happened to records after they reached the engine: written,
//! dropped on a full queue, forced through synchronously, or rejected by an
//! appender.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for engine health
///
/// # Example
///
/// ```
/// use qlog::EngineMetrics;
///
/// let metrics = EngineMetrics::new();
/// metrics.record_written();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.written(), 1);
/// assert_eq!(metrics.dropped(), 1);
/// assert_eq!(metrics.drop_rate(), 50.0);
/// ```
#[derive(Debug, Default)]
pub struct EngineMetrics {
    written: AtomicU64,
    dropped: AtomicU64,
    queue_full_events: AtomicU64,
    forced_writes: AtomicU64,
    appender_failures: AtomicU64,
}

impl EngineMetrics {
    pub const fn new() -> Self {
        Self {
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            forced_writes: AtomicU64::new(0),
            appender_failures: AtomicU64::new(0),
        }
    }

    /// Records handed to every appender without error
    #[inline]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Records lost to a full queue or a failing appender
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    /// Error-and-above records written on the caller's thread because the
    /// async queue was full
    #[inline]
    pub fn forced_writes(&self) -> u64 {
        self.forced_writes.load(Ordering::Relaxed)
    }

    /// Individual appender errors and panics
    #[inline]
    pub fn appender_failures(&self) -> u64 {
        self.appender_failures.load(Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_written(&self) -> u64 {
        self.written.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_forced_write(&self) -> u64 {
        self.forced_writes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_appender_failure(&self) -> u64 {
        self.appender_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Percentage of records dropped (0.0 - 100.0)
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped() as f64;
        let total = self.written() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}
