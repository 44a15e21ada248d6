use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::consumer::ConsumerSettings;
use crate::producer::ProducerSettings;

// ═══════════════════════════════════════════════════════════════
//  Producer Config
// ═══════════════════════════════════════════════════════════════

/// `[producer]` section of the agent config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    /// Starting target rate, messages per second.
    #[serde(default = "default_rate")]
    pub rate: u32,
    /// Upper bound for the flush at end of input.
    #[serde(default = "default_shutdown_flush_ms")]
    pub shutdown_flush_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            shutdown_flush_ms: default_shutdown_flush_ms(),
        }
    }
}

impl ProducerConfig {
    pub fn settings(&self) -> ProducerSettings {
        ProducerSettings {
            initial_rate: self.rate,
            shutdown_flush: Duration::from_millis(self.shutdown_flush_ms),
        }
    }
}

pub const DEFAULT_RATE: u32 = 10;

fn default_rate() -> u32 {
    DEFAULT_RATE
}
fn default_shutdown_flush_ms() -> u64 {
    5000
}

// ═══════════════════════════════════════════════════════════════
//  Consumer Config
// ═══════════════════════════════════════════════════════════════

/// `[consumer]` section of the agent config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Longest wait of a single broker poll.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: default_group_id(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl ConsumerConfig {
    pub fn settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            group_id: self.group_id.clone(),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
        }
    }
}

fn default_group_id() -> String {
    "1".into()
}
fn default_poll_timeout_ms() -> u64 {
    1000
}

// ═══════════════════════════════════════════════════════════════
//  Metrics Config
// ═══════════════════════════════════════════════════════════════

/// `[metrics]` section. Without a sender, metrics only go to the log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Executable invoked as `<sender> <metric> <value>`.
    pub sender: Option<PathBuf>,
}
