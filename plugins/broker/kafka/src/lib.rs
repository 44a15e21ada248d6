mod config;

use std::time::Duration;

use agent_api::{
    Broker, BrokerError, ClusterRole, CommitMode, ConsumedMessage, ConsumerRecord,
    ConsumerSession, Delivery, PendingRecord, ProducerSession,
};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::ClientContext;

pub use config::KafkaConfig;

// ═══════════════════════════════════════════════════════════════
//  KafkaBroker
// ═══════════════════════════════════════════════════════════════

/// `Broker` backed by librdkafka. Each role resolves to its own
/// bootstrap servers from [`KafkaConfig`].
#[derive(Debug, Clone)]
pub struct KafkaBroker {
    config: KafkaConfig,
}

impl KafkaBroker {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }
}

impl Broker for KafkaBroker {
    type Producer = KafkaProducerSession;
    type Consumer = KafkaConsumerSession;

    fn connect_producer(&self, cluster: ClusterRole, topic: &str) -> Result<KafkaProducerSession, BrokerError> {
        let producer: ThreadedProducer<CompletionContext> = self
            .config
            .producer_config(cluster)
            .create_with_context(CompletionContext)
            .map_err(|e| BrokerError::connect(format!("producer for {}: {e}", self.config.brokers(cluster))))?;
        tracing::info!(%cluster, brokers = self.config.brokers(cluster), topic, "kafka producer created");
        Ok(KafkaProducerSession {
            producer,
            topic: topic.to_string(),
        })
    }

    fn connect_consumer(
        &self,
        cluster: ClusterRole,
        topics: &[&str],
        group_id: &str,
    ) -> Result<KafkaConsumerSession, BrokerError> {
        let consumer: StreamConsumer = self
            .config
            .consumer_config(cluster, group_id)
            .create()
            .map_err(|e| BrokerError::connect(format!("consumer for {}: {e}", self.config.brokers(cluster))))?;
        consumer
            .subscribe(topics)
            .map_err(|e| BrokerError::subscribe(format!("{topics:?}: {e}")))?;
        tracing::info!(%cluster, brokers = self.config.brokers(cluster), ?topics, group_id, "kafka consumer subscribed");
        Ok(KafkaConsumerSession {
            consumer,
            max_poll_records: self.config.max_poll_records.max(1),
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Producer
// ═══════════════════════════════════════════════════════════════

/// Delivery callback context. Runs on the producer's polling thread and
/// touches nothing but the record handed back to it.
pub struct CompletionContext;

impl ClientContext for CompletionContext {}

impl ProducerContext for CompletionContext {
    type DeliveryOpaque = Box<PendingRecord>;

    fn delivery(&self, result: &DeliveryResult<'_>, record: Box<PendingRecord>) {
        let delivery = match result {
            Ok(msg) => Delivery::Delivered {
                partition: msg.partition(),
                offset: msg.offset(),
            },
            Err((e, _)) => Delivery::Failed(e.to_string()),
        };
        record.complete(&delivery);
    }
}

pub struct KafkaProducerSession {
    producer: ThreadedProducer<CompletionContext>,
    topic: String,
}

impl ProducerSession for KafkaProducerSession {
    fn submit(&mut self, record: PendingRecord) -> Result<(), BrokerError> {
        let (key, value) = record.payload_handles();
        let base = BaseRecord::with_opaque_to(&self.topic, Box::new(record))
            .key(&*key)
            .payload(&*value);
        self.producer.send(base).map_err(|(e, rejected)| {
            let reason = e.to_string();
            rejected.delivery_opaque.complete(&Delivery::Failed(reason.clone()));
            BrokerError::submit(format!("topic {}: {reason}", self.topic))
        })
    }

    fn flush(&mut self, timeout: Duration) -> Result<(), BrokerError> {
        self.producer
            .flush(timeout)
            .map_err(|e| BrokerError::flush(format!("topic {}: {e}", self.topic)))
    }

    fn close(self) -> Result<(), BrokerError> {
        let in_flight = self.producer.in_flight_count();
        if in_flight > 0 {
            tracing::warn!(topic = %self.topic, in_flight, "closing producer with unsent records");
        }
        drop(self.producer);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Consumer
// ═══════════════════════════════════════════════════════════════

pub struct KafkaConsumerSession {
    consumer: StreamConsumer,
    max_poll_records: usize,
}

impl ConsumerSession for KafkaConsumerSession {
    /// Wait up to `timeout` for the first message, then take whatever is
    /// already buffered without waiting again.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumerRecord>, BrokerError> {
        let mut flat = Vec::new();
        let mut wait = timeout;
        while flat.len() < self.max_poll_records {
            let msg = match tokio::time::timeout(wait, self.consumer.recv()).await {
                Ok(Ok(msg)) => msg.detach(),
                Ok(Err(e)) => return Err(BrokerError::poll(e.to_string())),
                Err(_) => break,
            };
            flat.push((
                msg.topic().to_string(),
                msg.partition(),
                ConsumedMessage {
                    offset: msg.offset(),
                    key: msg.key().map(<[u8]>::to_vec),
                    value: msg.payload().map(<[u8]>::to_vec),
                },
            ));
            wait = Duration::ZERO;
        }
        Ok(ConsumerRecord::group(flat))
    }

    fn commit_all(&mut self, mode: CommitMode) -> Result<(), BrokerError> {
        let mode = match mode {
            CommitMode::Sync => rdkafka::consumer::CommitMode::Sync,
            CommitMode::Async => rdkafka::consumer::CommitMode::Async,
        };
        match self.consumer.commit_consumer_state(mode) {
            Ok(()) => Ok(()),
            // Nothing consumed since the last commit.
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => Ok(()),
            Err(e) => Err(BrokerError::commit(e.to_string())),
        }
    }

    fn close(self) -> Result<(), BrokerError> {
        self.consumer.unsubscribe();
        drop(self.consumer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_config_is_a_connect_error() {
        let mut config = KafkaConfig::default();
        config
            .properties
            .insert("queue.buffering.max.kbytes".into(), "not-a-number".into());
        let broker = KafkaBroker::new(config);
        let err = broker
            .connect_producer(ClusterRole::Primary, "t")
            .err()
            .unwrap();
        assert_eq!(err.op(), agent_api::BrokerOp::Connect);
    }
}
