//! Shared atomic counters, replacing the module-level mutable globals of the system this
//! pipeline is modeled on with a small aggregate every worker holds a reference to.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Metrics {
    started_at: Instant,
    pub input_counter: AtomicU64,
    pub output_counter: AtomicU64,
    pub dropped_oversize: AtomicU64,
    pub live_workers: AtomicUsize,
    pub total_workers: usize,
}

impl Metrics {
    pub fn new(total_workers: usize) -> Self {
        Self {
            started_at: Instant::now(),
            input_counter: AtomicU64::new(0),
            output_counter: AtomicU64::new(0),
            dropped_oversize: AtomicU64::new(0),
            live_workers: AtomicUsize::new(total_workers),
            total_workers,
        }
    }

    pub fn record_input(&self) {
        self.input_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_output(&self, count: u64) {
        self.output_counter.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped_oversize(&self) {
        self.dropped_oversize.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_exited(&self) {
        self.live_workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.started_at.elapsed(),
            input_counter: self.input_counter.load(Ordering::Relaxed),
            output_counter: self.output_counter.load(Ordering::Relaxed),
            dropped_oversize: self.dropped_oversize.load(Ordering::Relaxed),
            live_workers: self.live_workers.load(Ordering::SeqCst),
            total_workers: self.total_workers,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub input_counter: u64,
    pub output_counter: u64,
    pub dropped_oversize: u64,
    pub live_workers: usize,
    pub total_workers: usize,
}

impl MetricsSnapshot {
    /// Lifetime rate of a counter, records per second since start-up.
    pub fn lifetime_rate(&self, counter: u64) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs <= 0.0 { 0.0 } else { counter as f64 / secs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = Metrics::new(4);
        metrics.record_input();
        metrics.record_input();
        metrics.record_output(1);
        metrics.record_dropped_oversize();
        metrics.worker_exited();

        let snap = metrics.snapshot();
        assert_eq!(snap.input_counter, 2);
        assert_eq!(snap.output_counter, 1);
        assert_eq!(snap.dropped_oversize, 1);
        assert_eq!(snap.live_workers, 3);
        assert_eq!(snap.total_workers, 4);
    }
}
