use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_api::{Bindings, TopicBinding};
use broker_kafka::KafkaConfig;
use clap::Args;
use control_loop::ProducerSettings;
use control_loop::config::{MetricsConfig, ProducerConfig};
use control_loop::logging::LogConfig;
use serde::Deserialize;

use super::error::ProducerError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

pub fn load_config(path: &str) -> Result<Config, ProducerError> {
    let content = std::fs::read_to_string(path).map_err(|e| ProducerError::Config {
        context: "read",
        detail: format!("'{path}': {e}"),
    })?;
    toml::from_str(&content).map_err(|e| ProducerError::Config {
        context: "parse",
        detail: format!("'{path}': {e}"),
    })
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct ProducerArgs {
    /// Topic on the primary cluster
    pub primary_topic: String,

    /// Topic on the backup cluster
    pub backup_topic: String,

    /// File whose lines are sent, one message per line
    pub input_file: PathBuf,

    /// Control FIFO (999 = fail over, 998 = fail back, other = rate)
    pub pipe_path: PathBuf,

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

    /// Starting rate in messages per second
    #[arg(long)]
    pub rate: Option<u32>,

    /// Longest wait for buffered sends at end of input, in ms
    #[arg(long)]
    pub shutdown_flush_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Settings after merging: defaults < agent.toml < env/CLI.
pub struct Effective {
    pub bindings: Bindings,
    pub input_file: PathBuf,
    pub pipe_path: PathBuf,
    pub kafka: KafkaConfig,
    pub settings: ProducerSettings,
    pub metrics_sender: Option<PathBuf>,
    pub log: LogConfig,
}

impl Effective {
    pub fn new(args: &ProducerArgs) -> Result<Self, ProducerError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };

        let mut kafka = cfg.kafka;
        if let Some(brokers) = &args.primary_brokers {
            kafka.primary = brokers.clone();
        }
        if let Some(brokers) = &args.backup_brokers {
            kafka.backup = brokers.clone();
        }

        let mut settings = cfg.producer.settings();
        if let Some(rate) = args.rate {
            settings.initial_rate = rate;
        }
        if let Some(ms) = args.shutdown_flush_ms {
            settings.shutdown_flush = Duration::from_millis(ms);
        }

        let mut log = cfg.log;
        if let Some(level) = &args.log_level {
            log.level = level.clone();
        }

        Ok(Self {
            bindings: Bindings::new(
                TopicBinding::single(args.primary_topic.clone()),
                TopicBinding::single(args.backup_topic.clone()),
            ),
            input_file: args.input_file.clone(),
            pipe_path: args.pipe_path.clone(),
            kafka,
            settings,
            metrics_sender: args.metrics_sender.clone().or(cfg.metrics.sender),
            log,
        })
    }
}
