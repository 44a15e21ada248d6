use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_millis(1000);

/// What happened when a pacing window was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowClose {
    /// Messages submitted in the window.
    pub sent: u32,
    /// Time from window start to the boundary, before any sleep.
    pub elapsed: Duration,
    /// Time spent sleeping to hold the rate. Zero when falling behind.
    pub slept: Duration,
}

impl WindowClose {
    pub fn fell_behind(&self) -> bool {
        self.elapsed >= WINDOW
    }
}

/// Count-gated pacer for the producer.
///
/// After `rate` submissions the window is full; closing it sleeps out
/// the rest of the second (if any) and starts a new window. A rate of 0
/// keeps every window full, which pauses submission.
#[derive(Debug)]
pub struct RateGovernor {
    rate: u32,
    sent: u32,
    window_start: Instant,
}

impl RateGovernor {
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            sent: 0,
            window_start: Instant::now(),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Adopt a new target. Takes effect against the current window count.
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
    }

    pub fn sent_in_window(&self) -> u32 {
        self.sent
    }

    pub fn window_full(&self) -> bool {
        self.sent >= self.rate
    }

    pub fn record_sent(&mut self) {
        self.sent = self.sent.saturating_add(1);
    }

    /// Sleep for the remainder of the window, then reset the counters.
    pub async fn close_window(&mut self) -> WindowClose {
        let elapsed = self.window_start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        tracing::debug!(elapsed_ms, rate = self.rate, "time diff");

        let slept = match WINDOW.checked_sub(elapsed) {
            Some(rest) if !rest.is_zero() => {
                tracing::debug!(sent = self.sent, elapsed_ms, "window done early, sleeping");
                tokio::time::sleep(rest).await;
                rest
            }
            _ => {
                tracing::warn!(
                    sent = self.sent,
                    elapsed_ms,
                    "falling behind, took {elapsed_ms}ms to write {} messages",
                    self.sent
                );
                Duration::ZERO
            }
        };

        let close = WindowClose {
            sent: self.sent,
            elapsed,
            slept,
        };
        self.window_start = Instant::now();
        self.sent = 0;
        close
    }
}
