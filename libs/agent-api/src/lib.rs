mod broker;
mod cluster;
mod error;
mod record;

pub use broker::{Broker, ConsumerSession, ProducerSession};
pub use cluster::{Bindings, ClusterRole, TopicBinding};
pub use error::{BrokerError, BrokerOp};
pub use record::{CommitMode, ConsumedMessage, ConsumerRecord, Delivery, PendingRecord};
