//! DUALLOG - Store Metrics & Observability
//! Counts store round trips in a lock-free, thread-safe manner using
//! `AtomicU64`, so parallel insert workers can record without contention.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters for a store backend.
///
/// All counters use `Ordering::Relaxed`; they are read for reporting only.
#[derive(Debug)]
pub struct StoreMetrics {
    /// Sorted-set `zadd` calls.
    pub zadds: AtomicU64,
    /// Range reads (`zrange_asc`, `zrange_desc`, `zcount`).
    pub range_reads: AtomicU64,
    /// Range removals (`zrem_range`).
    pub range_removals: AtomicU64,
    /// Scalar `get` calls.
    pub gets: AtomicU64,
    /// Scalar `set` calls.
    pub sets: AtomicU64,
    /// Bulk `delete` calls.
    pub deletes: AtomicU64,
    /// `scan` pages served.
    pub scans: AtomicU64,
    /// List pushes at either end.
    pub pushes: AtomicU64,
    /// Total bytes written (keys + values + members).
    pub bytes_written: AtomicU64,
    store_started: Instant,
}

impl StoreMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            zadds: AtomicU64::new(0),
            range_reads: AtomicU64::new(0),
            range_removals: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            scans: AtomicU64::new(0),
            pushes: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            store_started: Instant::now(),
        }
    }

    pub fn record_zadd(&self, key_size: usize, member_size: usize) {
        self.zadds.fetch_add(1, Ordering::Relaxed);
        self.add_bytes(key_size + member_size);
    }

    pub fn record_range_read(&self) {
        self.range_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_range_removal(&self) {
        self.range_removals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self, key_size: usize, value_size: usize) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.add_bytes(key_size + value_size);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_push(&self, key_size: usize, value_size: usize) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.add_bytes(key_size + value_size);
    }

    fn add_bytes(&self, n: usize) {
        self.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Seconds since the store was created.
    pub fn uptime_secs(&self) -> f64 {
        self.store_started.elapsed().as_secs_f64()
    }

    /// Every call that would be a network round trip against a remote store.
    pub fn round_trips(&self) -> u64 {
        self.zadds.load(Ordering::Relaxed)
            + self.range_reads.load(Ordering::Relaxed)
            + self.range_removals.load(Ordering::Relaxed)
            + self.gets.load(Ordering::Relaxed)
            + self.sets.load(Ordering::Relaxed)
            + self.deletes.load(Ordering::Relaxed)
            + self.scans.load(Ordering::Relaxed)
            + self.pushes.load(Ordering::Relaxed)
    }

    /// Round trips per second since the store was created.
    pub fn ops_per_sec(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime < 0.001 {
            return 0.0;
        }
        self.round_trips() as f64 / uptime
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "\n═══ Store Metrics ═══\n\
             Sorted sets:\n\
               zadds:          {}\n\
               range reads:    {}\n\
               range removals: {}\n\
             Keys:\n\
               gets:           {}\n\
               sets:           {}\n\
               deletes:        {}\n\
               scans:          {}\n\
               pushes:         {}\n\
             Throughput:\n\
               round trips:    {}\n\
               ops/sec:        {:.2}\n\
               written:        {} bytes\n\
             Uptime: {:.2}s",
            self.zadds.load(Ordering::Relaxed),
            self.range_reads.load(Ordering::Relaxed),
            self.range_removals.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
            self.scans.load(Ordering::Relaxed),
            self.pushes.load(Ordering::Relaxed),
            self.round_trips(),
            self.ops_per_sec(),
            self.bytes_written.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operations() {
        let m = StoreMetrics::new();

        m.record_zadd(5, 10);
        m.record_set(3, 7);
        m.record_get();
        m.record_range_read();
        m.record_range_removal();
        m.record_delete();
        m.record_scan();
        m.record_push(2, 2);

        assert_eq!(m.zadds.load(Ordering::Relaxed), 1);
        assert_eq!(m.sets.load(Ordering::Relaxed), 1);
        assert_eq!(m.bytes_written.load(Ordering::Relaxed), 29);
        assert_eq!(m.round_trips(), 8);
    }

    #[test]
    fn test_report_format() {
        let m = StoreMetrics::new();
        m.record_zadd(10, 20);
        let report = m.report();
        assert!(report.contains("zadds:"));
        assert!(report.contains("round trips:"));
        assert!(report.contains("written:"));
    }

    #[test]
    fn test_default() {
        assert_eq!(StoreMetrics::default().round_trips(), 0);
    }
}
