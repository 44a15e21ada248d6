use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_api::{Bindings, TopicBinding};
use broker_kafka::KafkaConfig;
use clap::{Args, Parser};
use control_loop::ConsumerSettings;
use control_loop::config::{ConsumerConfig, MetricsConfig};
use control_loop::logging::LogConfig;
use serde::Deserialize;

use crate::error::ConsumerError;

#[derive(Parser)]
#[command(name = "consumer", about = "Drains a Kafka topic pair to stdout with operator-driven failover")]
pub struct Cli {
    #[command(flatten)]
    pub args: ConsumeArgs,
}

#[derive(Args, Clone, Debug)]
pub struct ConsumeArgs {
    /// First topic on the primary cluster
    pub primary_topic1: String,

    /// Second topic on the primary cluster
    pub primary_topic2: String,

    /// First topic on the backup cluster
    pub backup_topic1: String,

    /// Second topic on the backup cluster
    pub backup_topic2: String,

    /// Control FIFO (999 = fail over, 998 = fail back)
    pub pipe_path: PathBuf,

    /// Label in metric names: consumer_<label>.primary_rate
    pub metrics_name: String,

    /// Path to the agent config file
    #[arg(long, default_value = "agent.toml", env = "FAILOVER_CONFIG")]
    pub config: String,

    /// bootstrap.servers of the primary cluster
    #[arg(long)]
    pub primary_brokers: Option<String>,

    /// bootstrap.servers of the backup cluster
    #[arg(long)]
    pub backup_brokers: Option<String>,

    /// Executable called as `<sender> <metric> <value>`
    #[arg(long)]
    pub metrics_sender: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. info, debug)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Consumer group
    #[arg(long)]
    pub group_id: Option<String>,

    /// Longest wait of one poll, in ms
    #[arg(long)]
    pub poll_timeout_ms: Option<u64>,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
pub struct ConsumerFileConfig {
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ConsumerFileConfig {
    pub fn load(path: &str) -> Result<Self, ConsumerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConsumerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        toml::from_str(&content)
            .map_err(|e| ConsumerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }
}

// ---- Effective ----

/// Settings after merging: defaults < agent.toml < env/CLI.
pub struct Effective {
    pub bindings: Bindings,
    pub pipe_path: PathBuf,
    pub metrics_name: String,
    pub kafka: KafkaConfig,
    pub settings: ConsumerSettings,
    pub metrics_sender: Option<PathBuf>,
    pub log: LogConfig,
}

impl Effective {
    pub fn new(args: &ConsumeArgs) -> Result<Self, ConsumerError> {
        let cfg = match ConsumerFileConfig::load(&args.config) {
            Ok(c) => c,
            Err(_) if !Path::new(&args.config).exists() => ConsumerFileConfig::default(),
            Err(e) => return Err(e),
        };

        let mut kafka = cfg.kafka;
        if let Some(brokers) = &args.primary_brokers {
            kafka.primary = brokers.clone();
        }
        if let Some(brokers) = &args.backup_brokers {
            kafka.backup = brokers.clone();
        }

        let mut settings = cfg.consumer.settings();
        if let Some(group) = &args.group_id {
            settings.group_id = group.clone();
        }
        if let Some(ms) = args.poll_timeout_ms {
            settings.poll_timeout = Duration::from_millis(ms);
        }

        let mut log = cfg.log;
        if let Some(level) = &args.log_level {
            log.level = level.clone();
        }

        Ok(Self {
            bindings: Bindings::new(
                TopicBinding::pair(args.primary_topic1.clone(), args.primary_topic2.clone()),
                TopicBinding::pair(args.backup_topic1.clone(), args.backup_topic2.clone()),
            ),
            pipe_path: args.pipe_path.clone(),
            metrics_name: args.metrics_name.clone(),
            kafka,
            settings,
            metrics_sender: args.metrics_sender.clone().or(cfg.metrics.sender),
            log,
        })
    }
}
