use std::future::Future;
use std::time::Duration;

use crate::{BrokerError, ClusterRole, CommitMode, ConsumerRecord, PendingRecord};

/// Factory for live broker bindings. One implementation per client
/// library; the control loop only ever talks to these traits.
pub trait Broker {
    type Producer: ProducerSession;
    type Consumer: ConsumerSession;

    /// Create a producer publishing to `topic` on `cluster`.
    fn connect_producer(&self, cluster: ClusterRole, topic: &str) -> Result<Self::Producer, BrokerError>;

    /// Create a consumer in `group_id` subscribed to `topics` on `cluster`.
    fn connect_consumer(
        &self,
        cluster: ClusterRole,
        topics: &[&str],
        group_id: &str,
    ) -> Result<Self::Consumer, BrokerError>;
}

/// A producer handle bound to one topic.
pub trait ProducerSession {
    /// Hand the record to the client without waiting for delivery.
    /// Ownership passes to the client, which releases it through
    /// [`PendingRecord::complete`] from its delivery callback.
    fn submit(&mut self, record: PendingRecord) -> Result<(), BrokerError>;

    /// Wait up to `timeout` for buffered sends to be delivered.
    fn flush(&mut self, timeout: Duration) -> Result<(), BrokerError>;

    /// Destroy the handle. Sends still buffered may be dropped.
    fn close(self) -> Result<(), BrokerError>;
}

/// A consumer handle subscribed to a topic pair.
pub trait ConsumerSession {
    /// Wait at most `timeout` for records. An empty batch is not an error.
    fn poll(&mut self, timeout: Duration) -> impl Future<Output = Result<Vec<ConsumerRecord>, BrokerError>>;

    /// Commit every offset consumed so far by this session.
    fn commit_all(&mut self, mode: CommitMode) -> Result<(), BrokerError>;

    /// Destroy the handle.
    fn close(self) -> Result<(), BrokerError>;
}
