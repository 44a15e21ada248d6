use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_millis(1000);

/// Wall-clock-gated rate measurement for the consumer.
///
/// Counters are never reset by a role switch: the first window after a
/// failover still includes messages consumed from the previous cluster.
#[derive(Debug)]
pub struct ThroughputMeter {
    total: u64,
    last_total: u64,
    window_start: Instant,
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self {
            total: 0,
            last_total: 0,
            window_start: Instant::now(),
        }
    }

    pub fn record(&mut self, n: u64) {
        self.total += n;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Close the window if at least a second has passed and return the
    /// realized rate in messages per second (truncated).
    pub fn tick(&mut self) -> Option<i64> {
        let elapsed = self.window_start.elapsed();
        if elapsed < WINDOW {
            return None;
        }
        let elapsed_ms = elapsed.as_millis() as u64;
        let secs = elapsed_ms as f64 / 1000.0;
        let delta = self.total - self.last_total;
        let rate = (delta as f64 / secs) as i64;
        tracing::info!(secs, delta, rate, "window closed");

        self.window_start = Instant::now();
        self.last_total = self.total;
        Some(rate)
    }
}
