//! Periodically logs pipeline counters and watches for worker loss. Polling-based: it does not
//! synchronize with worker exit, it just samples `Metrics` on a timer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::metrics::{Metrics, MetricsSnapshot};

/// The monitor sleeps in slices of this size so a halt can be detected up to this much sooner
/// than the full reporting period.
const POLL_SLICE: Duration = Duration::from_secs(5);

pub struct Monitor {
    metrics: Arc<Metrics>,
    period: Duration,
}

impl Monitor {
    pub fn new(metrics: Arc<Metrics>, period_in_seconds: u64) -> Self {
        Self { metrics, period: Duration::from_secs(period_in_seconds.max(1)) }
    }

    pub async fn run(self) {
        let mut previous: Option<MetricsSnapshot> = None;
        let mut elapsed_in_period = Duration::ZERO;

        loop {
            tokio::time::sleep(POLL_SLICE).await;
            elapsed_in_period += POLL_SLICE;

            let snapshot = self.metrics.snapshot();
            if snapshot.live_workers == 0 {
                info!(
                    uptime_secs = snapshot.uptime.as_secs(),
                    input = snapshot.input_counter,
                    output = snapshot.output_counter,
                    "all workers exited, halting monitor"
                );
                return;
            }

            if snapshot.total_workers > 0 && snapshot.live_workers * 2 < snapshot.total_workers {
                warn!(
                    live_workers = snapshot.live_workers,
                    total_workers = snapshot.total_workers,
                    "running low on workers"
                );
            }

            if elapsed_in_period >= self.period {
                self.log_stats(&snapshot, previous.as_ref());
                previous = Some(snapshot);
                elapsed_in_period = Duration::ZERO;
            }
        }
    }

    fn log_stats(&self, snapshot: &MetricsSnapshot, previous: Option<&MetricsSnapshot>) {
        let interval_secs = self.period.as_secs_f64().max(1.0);
        let (input_delta, output_delta) = match previous {
            Some(prev) => (
                snapshot.input_counter.saturating_sub(prev.input_counter),
                snapshot.output_counter.saturating_sub(prev.output_counter),
            ),
            None => (snapshot.input_counter, snapshot.output_counter),
        };

        info!(
            uptime_secs = snapshot.uptime.as_secs(),
            total_workers = snapshot.total_workers,
            live_workers = snapshot.live_workers,
            input_counter = snapshot.input_counter,
            output_counter = snapshot.output_counter,
            dropped_oversize = snapshot.dropped_oversize,
            input_interval_rate = input_delta as f64 / interval_secs,
            output_interval_rate = output_delta as f64 / interval_secs,
            input_lifetime_rate = snapshot.lifetime_rate(snapshot.input_counter),
            output_lifetime_rate = snapshot.lifetime_rate(snapshot.output_counter),
            "pipeline progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn halts_once_all_workers_exit() {
        let metrics = Arc::new(Metrics::new(1));
        metrics.worker_exited();
        let monitor = Monitor::new(metrics, 600);

        tokio::time::timeout(Duration::from_secs(10), monitor.run())
            .await
            .expect("monitor should halt promptly once live_workers hits zero");
    }
}
