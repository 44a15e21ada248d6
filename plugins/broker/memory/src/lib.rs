use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use agent_api::{
    Broker, BrokerError, ClusterRole, CommitMode, ConsumedMessage, ConsumerRecord,
    ConsumerSession, Delivery, PendingRecord, ProducerSession,
};

// ═══════════════════════════════════════════════════════════════
//  Events
// ═══════════════════════════════════════════════════════════════

/// Lifecycle events observed by the in-memory broker, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    ProducerOpened { cluster: ClusterRole, topic: String },
    ProducerFlushed { cluster: ClusterRole, topic: String },
    ProducerClosed { cluster: ClusterRole, topic: String },
    ConsumerOpened { cluster: ClusterRole, topics: Vec<String>, group: String },
    Committed { cluster: ClusterRole, group: String, offsets: Vec<(String, i64)> },
    ConsumerClosed { cluster: ClusterRole, topics: Vec<String> },
}

#[derive(Debug, Clone)]
struct StoredMessage {
    key: Vec<u8>,
    value: Vec<u8>,
}

#[derive(Default)]
struct State {
    logs: HashMap<(ClusterRole, String), Vec<StoredMessage>>,
    /// (cluster, group, topic) → next offset to read.
    committed: HashMap<(ClusterRole, String, String), i64>,
    events: Vec<BrokerEvent>,
    live: usize,
    max_live: usize,
    completions: u64,
    polls: u64,
    fail_connects: usize,
    fail_commits: bool,
}

impl State {
    fn opened(&mut self, event: BrokerEvent) {
        self.live += 1;
        self.max_live = self.max_live.max(self.live);
        self.events.push(event);
    }

    fn closed(&mut self, event: BrokerEvent) {
        self.live = self.live.saturating_sub(1);
        self.events.push(event);
    }

    fn take_connect_failure(&mut self) -> bool {
        if self.fail_connects > 0 {
            self.fail_connects -= 1;
            true
        } else {
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// In-process broker with one partition per topic and per-cluster logs.
///
/// Clones share state, so a test keeps one handle for inspection and
/// hands another to the agent.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message directly to `topic` on `cluster`.
    pub fn publish(&self, cluster: ClusterRole, topic: &str, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.state()
            .logs
            .entry((cluster, topic.to_string()))
            .or_default()
            .push(StoredMessage {
                key: key.as_ref().to_vec(),
                value: value.as_ref().to_vec(),
            });
    }

    fn stored<T>(&self, cluster: ClusterRole, topic: &str, f: impl Fn(&StoredMessage) -> T) -> Vec<T> {
        self.state()
            .logs
            .get(&(cluster, topic.to_string()))
            .map(|log| log.iter().map(f).collect())
            .unwrap_or_default()
    }

    /// Raw value bytes stored in `topic` on `cluster`, in offset order.
    pub fn payloads(&self, cluster: ClusterRole, topic: &str) -> Vec<Vec<u8>> {
        self.stored(cluster, topic, |m| m.value.clone())
    }

    /// Values stored in `topic` on `cluster`, decoded lossily as UTF-8.
    pub fn values(&self, cluster: ClusterRole, topic: &str) -> Vec<String> {
        self.stored(cluster, topic, |m| String::from_utf8_lossy(&m.value).into_owned())
    }

    /// Keys stored in `topic` on `cluster`, in offset order.
    pub fn keys(&self, cluster: ClusterRole, topic: &str) -> Vec<String> {
        self.stored(cluster, topic, |m| String::from_utf8_lossy(&m.key).into_owned())
    }

    pub fn committed_offset(&self, cluster: ClusterRole, group: &str, topic: &str) -> Option<i64> {
        self.state()
            .committed
            .get(&(cluster, group.to_string(), topic.to_string()))
            .copied()
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        self.state().events.clone()
    }

    /// Sessions currently open.
    pub fn live_sessions(&self) -> usize {
        self.state().live
    }

    /// Highest number of sessions that were ever open at the same time.
    pub fn max_live_sessions(&self) -> usize {
        self.state().max_live
    }

    /// Delivery callbacks fired so far.
    pub fn completions(&self) -> u64 {
        self.state().completions
    }

    pub fn polls(&self) -> u64 {
        self.state().polls
    }

    /// Make the next `n` connect calls fail.
    pub fn fail_connects(&self, n: usize) {
        self.state().fail_connects = n;
    }

    pub fn fail_commits(&self, fail: bool) {
        self.state().fail_commits = fail;
    }
}

impl Broker for MemoryBroker {
    type Producer = MemoryProducer;
    type Consumer = MemoryConsumer;

    fn connect_producer(&self, cluster: ClusterRole, topic: &str) -> Result<MemoryProducer, BrokerError> {
        let mut state = self.state();
        if state.take_connect_failure() {
            return Err(BrokerError::connect(format!("injected failure for {cluster}:{topic}")));
        }
        state.opened(BrokerEvent::ProducerOpened {
            cluster,
            topic: topic.to_string(),
        });
        Ok(MemoryProducer {
            broker: self.clone(),
            cluster,
            topic: topic.to_string(),
        })
    }

    fn connect_consumer(
        &self,
        cluster: ClusterRole,
        topics: &[&str],
        group_id: &str,
    ) -> Result<MemoryConsumer, BrokerError> {
        let mut state = self.state();
        if state.take_connect_failure() {
            return Err(BrokerError::connect(format!("injected failure for {cluster}")));
        }
        let positions = topics
            .iter()
            .map(|t| {
                let start = state
                    .committed
                    .get(&(cluster, group_id.to_string(), t.to_string()))
                    .copied()
                    .unwrap_or(0);
                (t.to_string(), start)
            })
            .collect();
        state.opened(BrokerEvent::ConsumerOpened {
            cluster,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            group: group_id.to_string(),
        });
        Ok(MemoryConsumer {
            broker: self.clone(),
            cluster,
            group: group_id.to_string(),
            positions,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sessions
// ═══════════════════════════════════════════════════════════════

pub struct MemoryProducer {
    broker: MemoryBroker,
    cluster: ClusterRole,
    topic: String,
}

impl ProducerSession for MemoryProducer {
    fn submit(&mut self, record: PendingRecord) -> Result<(), BrokerError> {
        let offset = {
            let mut state = self.broker.state();
            let log = state.logs.entry((self.cluster, self.topic.clone())).or_default();
            log.push(StoredMessage {
                key: record.key().to_vec(),
                value: record.value().to_vec(),
            });
            let offset = log.len() as i64 - 1;
            state.completions += 1;
            offset
        };
        record.complete(&Delivery::Delivered { partition: 0, offset });
        Ok(())
    }

    fn flush(&mut self, _timeout: Duration) -> Result<(), BrokerError> {
        self.broker.state().events.push(BrokerEvent::ProducerFlushed {
            cluster: self.cluster,
            topic: self.topic.clone(),
        });
        Ok(())
    }

    fn close(self) -> Result<(), BrokerError> {
        self.broker.state().closed(BrokerEvent::ProducerClosed {
            cluster: self.cluster,
            topic: self.topic,
        });
        Ok(())
    }
}

pub struct MemoryConsumer {
    broker: MemoryBroker,
    cluster: ClusterRole,
    group: String,
    /// topic → next offset to hand out, in subscription order.
    positions: Vec<(String, i64)>,
}

impl MemoryConsumer {
    fn drain(&mut self) -> Vec<ConsumerRecord> {
        let state = self.broker.state();
        let mut flat = Vec::new();
        for (topic, pos) in self.positions.iter_mut() {
            let Some(log) = state.logs.get(&(self.cluster, topic.clone())) else {
                continue;
            };
            for (offset, m) in log.iter().enumerate().skip(*pos as usize) {
                flat.push((
                    topic.clone(),
                    0,
                    ConsumedMessage {
                        offset: offset as i64,
                        key: Some(m.key.clone()),
                        value: Some(m.value.clone()),
                    },
                ));
            }
            *pos = log.len() as i64;
        }
        ConsumerRecord::group(flat)
    }
}

impl ConsumerSession for MemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumerRecord>, BrokerError> {
        self.broker.state().polls += 1;
        let records = self.drain();
        if records.is_empty() {
            tokio::time::sleep(timeout).await;
        }
        Ok(records)
    }

    fn commit_all(&mut self, _mode: CommitMode) -> Result<(), BrokerError> {
        let mut state = self.broker.state();
        if state.fail_commits {
            return Err(BrokerError::commit("injected commit failure"));
        }
        for (topic, pos) in &self.positions {
            state
                .committed
                .insert((self.cluster, self.group.clone(), topic.clone()), *pos);
        }
        state.events.push(BrokerEvent::Committed {
            cluster: self.cluster,
            group: self.group.clone(),
            offsets: self.positions.clone(),
        });
        Ok(())
    }

    fn close(self) -> Result<(), BrokerError> {
        self.broker.state().closed(BrokerEvent::ConsumerClosed {
            cluster: self.cluster,
            topics: self.positions.into_iter().map(|(t, _)| t).collect(),
        });
        Ok(())
    }
}
