use std::collections::BTreeMap;

use agent_api::ClusterRole;
use rdkafka::ClientConfig;
use serde::Deserialize;

/// `[kafka]` section: cluster endpoints and client tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    /// `bootstrap.servers` of the primary cluster.
    #[serde(default = "default_brokers")]
    pub primary: String,
    /// `bootstrap.servers` of the backup cluster.
    #[serde(default = "default_brokers")]
    pub backup: String,
    /// Producer buffer size, `queue.buffering.max.kbytes`.
    #[serde(default = "default_buffer_kbytes")]
    pub buffer_kbytes: u32,
    /// Producer buffering latency, `queue.buffering.max.ms`.
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    /// Most messages returned by one consumer poll.
    #[serde(default = "default_max_poll_records")]
    pub max_poll_records: usize,
    #[serde(default = "default_offset_reset")]
    pub auto_offset_reset: String,
    /// Raw librdkafka properties, applied last.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            primary: default_brokers(),
            backup: default_brokers(),
            buffer_kbytes: default_buffer_kbytes(),
            linger_ms: default_linger_ms(),
            max_poll_records: default_max_poll_records(),
            auto_offset_reset: default_offset_reset(),
            properties: BTreeMap::new(),
        }
    }
}

fn default_brokers() -> String {
    "localhost:9092".into()
}
fn default_buffer_kbytes() -> u32 {
    32768
}
fn default_linger_ms() -> u32 {
    500
}
fn default_max_poll_records() -> usize {
    500
}
fn default_offset_reset() -> String {
    "earliest".into()
}

impl KafkaConfig {
    pub fn brokers(&self, cluster: ClusterRole) -> &str {
        match cluster {
            ClusterRole::Primary => &self.primary,
            ClusterRole::Backup => &self.backup,
        }
    }

    pub fn producer_config(&self, cluster: ClusterRole) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", self.brokers(cluster))
            .set("queue.buffering.max.kbytes", self.buffer_kbytes.to_string())
            .set("queue.buffering.max.ms", self.linger_ms.to_string());
        self.apply_properties(&mut cfg);
        cfg
    }

    /// Offsets are committed by the control loop, never automatically.
    pub fn consumer_config(&self, cluster: ClusterRole, group_id: &str) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", self.brokers(cluster))
            .set("group.id", group_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");
        self.apply_properties(&mut cfg);
        cfg
    }

    fn apply_properties(&self, cfg: &mut ClientConfig) {
        for (key, value) in &self.properties {
            cfg.set(key, value);
        }
    }
}
