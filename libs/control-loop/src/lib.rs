pub mod config;
pub mod error;
pub mod logging;

mod consumer;
mod control;
mod failover;
mod governor;
mod meter;
mod metrics;
mod producer;
mod session;

pub use consumer::{ConsumerAgent, ConsumerBinder, ConsumerSettings};
pub use control::{ConsumerCommand, ControlChannel, ProducerCommand, FAIL_BACK_CODE, FAIL_OVER_CODE};
pub use error::AgentError;
pub use failover::{Failover, Switch, Transition};
pub use governor::{RateGovernor, WindowClose};
pub use meter::ThroughputMeter;
pub use metrics::{
    CommandSink, ConfiguredSink, LogSink, MetricNames, MetricsEmitter, MetricsError, MetricsSink,
};
pub use producer::{ProducerAgent, ProducerBinder, ProducerSettings, ProducerSummary};
pub use session::{Binder, SessionManager};
