//! Runtime metrics and instrumentation.
//!
//! Lock-free `AtomicU64` counters are bumped on the apply path and read on
//! export. The apply-latency ring buffer sits behind a `parking_lot::Mutex`
//! because it is written once per event and read rarely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters for the apply path.
#[derive(Debug)]
pub struct EngineCounters {
    /// Events committed.
    pub events_applied: AtomicU64,
    /// Events recognised as already committed.
    pub duplicates: AtomicU64,
    /// Events that failed on a missing record or a rejected underflow.
    pub ordering_violations: AtomicU64,
    /// Transient failures that were retried.
    pub transient_retries: AtomicU64,
    /// Events abandoned after every attempt failed transiently.
    pub retries_exhausted: AtomicU64,
    /// Prefetch snapshots found stale at apply time.
    pub stale_refetches: AtomicU64,
    /// Decrements clamped to zero (and saturated additions).
    pub clamped_decrements: AtomicU64,
    /// Bucket updates skipped for out-of-range or unmapped indices.
    pub skipped_buckets: AtomicU64,
    /// Entity and aggregate records written.
    pub records_written: AtomicU64,
    /// Audit records written.
    pub audits_written: AtomicU64,
}

impl EngineCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events_applied: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            ordering_violations: AtomicU64::new(0),
            transient_retries: AtomicU64::new(0),
            retries_exhausted: AtomicU64::new(0),
            stale_refetches: AtomicU64::new(0),
            clamped_decrements: AtomicU64::new(0),
            skipped_buckets: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            audits_written: AtomicU64::new(0),
        }
    }

    /// Add `n` to `counter`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            ordering_violations: self.ordering_violations.load(Ordering::Relaxed),
            transient_retries: self.transient_retries.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
            stale_refetches: self.stale_refetches.load(Ordering::Relaxed),
            clamped_decrements: self.clamped_decrements.load(Ordering::Relaxed),
            skipped_buckets: self.skipped_buckets.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            audits_written: self.audits_written.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Events committed.
    pub events_applied: u64,
    /// Duplicate deliveries absorbed.
    pub duplicates: u64,
    /// Ordering violations.
    pub ordering_violations: u64,
    /// Transient retries.
    pub transient_retries: u64,
    /// Events abandoned after retries.
    pub retries_exhausted: u64,
    /// Stale prefetch snapshots.
    pub stale_refetches: u64,
    /// Clamped decrements.
    pub clamped_decrements: u64,
    /// Skipped bucket updates.
    pub skipped_buckets: u64,
    /// Records written.
    pub records_written: u64,
    /// Audit records written.
    pub audits_written: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP herostat_events_applied_total Events committed\n\
             # TYPE herostat_events_applied_total counter\n\
             herostat_events_applied_total {}\n\
             # HELP herostat_duplicates_total Duplicate deliveries absorbed\n\
             # TYPE herostat_duplicates_total counter\n\
             herostat_duplicates_total {}\n\
             # HELP herostat_ordering_violations_total Events failed on ordering violations\n\
             # TYPE herostat_ordering_violations_total counter\n\
             herostat_ordering_violations_total {}\n\
             # HELP herostat_transient_retries_total Transient failures retried\n\
             # TYPE herostat_transient_retries_total counter\n\
             herostat_transient_retries_total {}\n\
             # HELP herostat_retries_exhausted_total Events abandoned after retries\n\
             # TYPE herostat_retries_exhausted_total counter\n\
             herostat_retries_exhausted_total {}\n\
             # HELP herostat_stale_refetches_total Stale prefetch snapshots refetched\n\
             # TYPE herostat_stale_refetches_total counter\n\
             herostat_stale_refetches_total {}\n\
             # HELP herostat_clamped_decrements_total Counter updates clamped\n\
             # TYPE herostat_clamped_decrements_total counter\n\
             herostat_clamped_decrements_total {}\n\
             # HELP herostat_skipped_buckets_total Bucket updates skipped\n\
             # TYPE herostat_skipped_buckets_total counter\n\
             herostat_skipped_buckets_total {}\n\
             # HELP herostat_records_written_total Records written\n\
             # TYPE herostat_records_written_total counter\n\
             herostat_records_written_total {}\n\
             # HELP herostat_audits_written_total Audit records written\n\
             # TYPE herostat_audits_written_total counter\n\
             herostat_audits_written_total {}\n",
            self.events_applied,
            self.duplicates,
            self.ordering_violations,
            self.transient_retries,
            self.retries_exhausted,
            self.stale_refetches,
            self.clamped_decrements,
            self.skipped_buckets,
            self.records_written,
            self.audits_written,
        )
    }
}

// ---------------------------------------------------------------------------
// Apply latency
// ---------------------------------------------------------------------------

const LATENCY_WINDOW: usize = 512;

/// Ring buffer of recent apply latencies.
#[derive(Debug)]
pub struct LatencyMonitor {
    history: Mutex<LatencyHistory>,
}

#[derive(Debug)]
struct LatencyHistory {
    samples_us: Vec<u64>,
    write_idx: usize,
    count: u64,
}

impl LatencyMonitor {
    /// An empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: Mutex::new(LatencyHistory {
                samples_us: vec![0; LATENCY_WINDOW],
                write_idx: 0,
                count: 0,
            }),
        }
    }

    /// Start timing one apply. The sample is recorded when the guard drops.
    #[must_use]
    pub fn start(&self) -> LatencyGuard<'_> {
        LatencyGuard {
            monitor: self,
            start: Instant::now(),
        }
    }

    /// Record a sample in microseconds.
    pub fn record(&self, micros: u64) {
        let mut h = self.history.lock();
        let idx = h.write_idx;
        h.samples_us[idx] = micros;
        h.write_idx = (idx + 1) % LATENCY_WINDOW;
        h.count += 1;
    }

    /// Samples recorded since startup.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.history.lock().count
    }

    /// P50, P95, P99 and max over the window.
    #[must_use]
    pub fn percentiles(&self) -> LatencyPercentiles {
        let h = self.history.lock();
        let n = usize::try_from(h.count).map_or(LATENCY_WINDOW, |c| c.min(LATENCY_WINDOW));
        if n == 0 {
            return LatencyPercentiles::default();
        }
        let mut sorted = h.samples_us[..n].to_vec();
        drop(h);
        sorted.sort_unstable();
        let at = |pct: usize| sorted[(n * pct / 100).min(n - 1)];
        LatencyPercentiles {
            p50_us: at(50),
            p95_us: at(95),
            p99_us: at(99),
            max_us: sorted[n - 1],
        }
    }
}

impl Default for LatencyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that records elapsed time when dropped.
#[derive(Debug)]
pub struct LatencyGuard<'a> {
    monitor: &'a LatencyMonitor,
    start: Instant,
}

impl Drop for LatencyGuard<'_> {
    fn drop(&mut self) {
        let micros = u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.monitor.record(micros);
    }
}

/// Apply latency percentiles in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyPercentiles {
    /// Median.
    pub p50_us: u64,
    /// 95th percentile.
    pub p95_us: u64,
    /// 99th percentile.
    pub p99_us: u64,
    /// Maximum in the window.
    pub max_us: u64,
}

impl LatencyPercentiles {
    /// Format as a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "P50={}us  P95={}us  P99={}us  Max={}us",
            self.p50_us, self.p95_us, self.p99_us, self.max_us
        )
    }
}

// ---------------------------------------------------------------------------
// Tracing span names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::span!`.
pub mod spans {
    /// One event end to end, retries included.
    pub const PROCESS: &str = "herostat::process";
    /// Prefetch phase.
    pub const PREFETCH: &str = "herostat::prefetch";
    /// Apply phase.
    pub const APPLY: &str = "herostat::apply";
    /// Store commit.
    pub const COMMIT: &str = "herostat::commit";
    /// Consistency check.
    pub const CONSISTENCY: &str = "herostat::consistency";
    /// Indexer pipeline run.
    pub const PIPELINE: &str = "herostat::pipeline";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_default_zero() {
        let c = EngineCounters::new();
        assert_eq!(c.snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn counters_increment_and_snapshot() {
        let c = EngineCounters::new();
        EngineCounters::add(&c.events_applied, 5);
        EngineCounters::add(&c.clamped_decrements, 2);
        let snap = c.snapshot();
        assert_eq!(snap.events_applied, 5);
        assert_eq!(snap.clamped_decrements, 2);
        assert_eq!(snap.duplicates, 0);
    }

    #[test]
    fn prometheus_format_valid() {
        let c = EngineCounters::new();
        EngineCounters::add(&c.events_applied, 42);
        let prom = c.snapshot().to_prometheus();
        assert!(prom.contains("herostat_events_applied_total 42"));
        assert!(prom.contains("# TYPE"));
        assert!(prom.contains("# HELP"));
    }

    #[test]
    fn latency_percentiles_are_ordered() {
        let monitor = LatencyMonitor::new();
        for i in 0..100 {
            monitor.record(i * 10);
        }
        let pct = monitor.percentiles();
        assert_eq!(monitor.count(), 100);
        assert!(pct.p50_us <= pct.p95_us);
        assert!(pct.p95_us <= pct.p99_us);
        assert_eq!(pct.max_us, 990);
        assert!(pct.summary().contains("P50="));
    }

    #[test]
    fn latency_guard_records_on_drop() {
        let monitor = LatencyMonitor::new();
        {
            let _guard = monitor.start();
        }
        assert_eq!(monitor.count(), 1);
    }

    #[test]
    fn empty_monitor_reports_zero() {
        assert_eq!(LatencyMonitor::new().percentiles(), LatencyPercentiles::default());
    }
}
