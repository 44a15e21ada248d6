use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use agent_api::ClusterRole;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("spawn '{sender}': {source}")]
    Spawn { sender: String, source: std::io::Error },

    #[error("'{sender}' exited with {status}")]
    Exit { sender: String, status: ExitStatus },
}

// ═══════════════════════════════════════════════════════════════
//  Sinks
// ═══════════════════════════════════════════════════════════════

/// Destination of rate metrics.
pub trait MetricsSink {
    fn send(&self, metric: &str, value: i64) -> impl Future<Output = Result<(), MetricsError>>;
}

/// Runs `<sender> <metric> <value>` once per metric.
///
/// The child gets no stdin and no stdout: the consumer writes payloads
/// to stdout and a chatty sender must not interleave with them.
#[derive(Debug, Clone)]
pub struct CommandSink {
    sender: PathBuf,
}

impl CommandSink {
    pub fn new(sender: impl Into<PathBuf>) -> Self {
        Self { sender: sender.into() }
    }
}

impl MetricsSink for CommandSink {
    async fn send(&self, metric: &str, value: i64) -> Result<(), MetricsError> {
        let status = Command::new(&self.sender)
            .arg(metric)
            .arg(value.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|source| MetricsError::Spawn {
                sender: self.sender.display().to_string(),
                source,
            })?;
        if !status.success() {
            return Err(MetricsError::Exit {
                sender: self.sender.display().to_string(),
                status,
            });
        }
        tracing::debug!(metric, value, "metric sent");
        Ok(())
    }
}

/// Writes metrics to the log. Used when no sender is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    async fn send(&self, metric: &str, value: i64) -> Result<(), MetricsError> {
        tracing::info!(metric, value, "metric");
        Ok(())
    }
}

/// Sink chosen from configuration at startup.
#[derive(Debug, Clone)]
pub enum ConfiguredSink {
    Command(CommandSink),
    Log(LogSink),
}

impl ConfiguredSink {
    pub fn from_sender(sender: Option<PathBuf>) -> Self {
        match sender {
            Some(path) => ConfiguredSink::Command(CommandSink::new(path)),
            None => ConfiguredSink::Log(LogSink),
        }
    }
}

impl MetricsSink for ConfiguredSink {
    async fn send(&self, metric: &str, value: i64) -> Result<(), MetricsError> {
        match self {
            ConfiguredSink::Command(sink) => sink.send(metric, value).await,
            ConfiguredSink::Log(sink) => sink.send(metric, value).await,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Emitter
// ═══════════════════════════════════════════════════════════════

/// Per-role metric names of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    primary: String,
    backup: String,
}

impl MetricNames {
    pub fn producer() -> Self {
        Self {
            primary: "producer.primary_rate".into(),
            backup: "producer.backup_rate".into(),
        }
    }

    /// Names for the consumer instance labelled `label`.
    pub fn consumer(label: &str) -> Self {
        Self {
            primary: format!("consumer_{label}.primary_rate"),
            backup: format!("consumer_{label}.backup_rate"),
        }
    }

    pub fn for_role(&self, role: ClusterRole) -> &str {
        match role {
            ClusterRole::Primary => &self.primary,
            ClusterRole::Backup => &self.backup,
        }
    }
}

/// Reports the active role's rate and zeroes the inactive one.
pub struct MetricsEmitter<M> {
    sink: M,
    names: MetricNames,
}

impl<M: MetricsSink> MetricsEmitter<M> {
    pub fn new(sink: M, names: MetricNames) -> Self {
        Self { sink, names }
    }

    /// Emit both values. Failures are logged and counted, never raised,
    /// and a failed first send does not skip the second.
    pub async fn report(&self, active: ClusterRole, rate: i64) -> usize {
        let mut failures = 0;
        let reports = [
            (self.names.for_role(active), rate),
            (self.names.for_role(active.other()), 0),
        ];
        for (metric, value) in reports {
            if let Err(e) = self.sink.send(metric, value).await {
                tracing::warn!(metric, value, error = %e, "metric sender failed");
                failures += 1;
            }
        }
        failures
    }
}
