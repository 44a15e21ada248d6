use std::io::{Read, Write};
use std::time::Duration;

use agent_api::{Bindings, Broker, BrokerError, ClusterRole, CommitMode, ConsumerSession, TopicBinding};

use crate::control::{ConsumerCommand, ControlChannel};
use crate::error::AgentError;
use crate::meter::ThroughputMeter;
use crate::metrics::{MetricsEmitter, MetricsSink};
use crate::session::{Binder, SessionManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    pub group_id: String,
    /// Longest wait of a single poll.
    pub poll_timeout: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group_id: "1".into(),
            poll_timeout: Duration::from_millis(1000),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Binder
// ═══════════════════════════════════════════════════════════════

/// Consumer sessions subscribe to every topic of a binding.
pub struct ConsumerBinder<B> {
    broker: B,
    group_id: String,
}

impl<B> ConsumerBinder<B> {
    pub fn new(broker: B, group_id: impl Into<String>) -> Self {
        Self {
            broker,
            group_id: group_id.into(),
        }
    }
}

impl<B: Broker> Binder for ConsumerBinder<B> {
    type Session = B::Consumer;

    fn open(&self, cluster: ClusterRole, binding: &TopicBinding) -> Result<B::Consumer, BrokerError> {
        self.broker
            .connect_consumer(cluster, &binding.names(), &self.group_id)
    }

    /// Commit synchronously, then destroy. A failed commit is logged and
    /// the session is closed regardless.
    fn teardown(&self, cluster: ClusterRole, mut session: B::Consumer) -> Result<(), BrokerError> {
        match session.commit_all(CommitMode::Sync) {
            Ok(()) => tracing::debug!(%cluster, "commit successful"),
            Err(e) => tracing::warn!(%cluster, error = %e, "error committing"),
        }
        session.close()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Agent
// ═══════════════════════════════════════════════════════════════

/// Drains the active cluster's topics to an output stream.
pub struct ConsumerAgent<B: Broker, R, M> {
    sessions: SessionManager<ConsumerBinder<B>>,
    meter: ThroughputMeter,
    control: ControlChannel<R>,
    metrics: MetricsEmitter<M>,
    poll_timeout: Duration,
}

impl<B, R, M> ConsumerAgent<B, R, M>
where
    B: Broker,
    R: Read,
    M: MetricsSink,
{
    /// Open the primary consumer. Fails if the primary is unreachable.
    pub fn start(
        broker: B,
        bindings: Bindings,
        control: ControlChannel<R>,
        metrics: MetricsEmitter<M>,
        settings: ConsumerSettings,
    ) -> Result<Self, AgentError> {
        tracing::info!(group = %settings.group_id, "consumer starting");
        let binder = ConsumerBinder::new(broker, settings.group_id);
        let sessions = SessionManager::start(binder, bindings)?;
        Ok(Self {
            sessions,
            meter: ThroughputMeter::new(),
            control,
            metrics,
            poll_timeout: settings.poll_timeout,
        })
    }

    pub fn active_role(&self) -> ClusterRole {
        self.sessions.active_role()
    }

    /// Messages consumed since start, across every role switch.
    pub fn consumed(&self) -> u64 {
        self.meter.total()
    }

    pub fn switches(&self) -> u64 {
        self.sessions.switches()
    }

    /// One loop iteration: report, check the control channel, poll,
    /// write values, commit. Returns the number of messages consumed.
    pub async fn step<W: Write>(&mut self, out: &mut W) -> Result<usize, AgentError> {
        if let Some(rate) = self.meter.tick() {
            self.metrics.report(self.active_role(), rate).await;
        }

        if let Some(code) = self.control.poll_code()? {
            let command = ConsumerCommand::from_code(code);
            tracing::info!(code, ?command, "control command");
            let transition = command.transition()?;
            self.sessions.switch(transition)?;
        }

        let role = self.sessions.active_role();
        let session = self.sessions.session()?;
        let records = session
            .poll(self.poll_timeout)
            .await
            .map_err(|e| AgentError::broker(role, e))?;

        let mut consumed = 0;
        for record in &records {
            for msg in &record.messages {
                tracing::debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = msg.offset,
                    key = ?msg.key.as_deref().map(String::from_utf8_lossy),
                    "consumed"
                );
                if let Some(value) = &msg.value {
                    out.write_all(value).map_err(AgentError::Output)?;
                    out.write_all(b"\n").map_err(AgentError::Output)?;
                }
                consumed += 1;
            }
        }
        if consumed > 0 {
            out.flush().map_err(AgentError::Output)?;
        }
        self.meter.record(consumed as u64);

        if let Err(e) = session.commit_all(CommitMode::Sync) {
            tracing::warn!(cluster = %role, error = %e, "error committing");
        }
        Ok(consumed)
    }

    /// Consume until a fatal error.
    pub async fn run<W: Write>(mut self, mut out: W) -> Result<(), AgentError> {
        loop {
            self.step(&mut out).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_memory::{BrokerEvent, MemoryBroker};
    use std::io::Cursor;

    use crate::metrics::{LogSink, MetricNames};

    fn bindings() -> Bindings {
        Bindings::new(TopicBinding::pair("p1", "p2"), TopicBinding::pair("b1", "b2"))
    }

    fn agent(
        broker: &MemoryBroker,
        control: &'static str,
    ) -> ConsumerAgent<MemoryBroker, Cursor<&'static str>, LogSink> {
        ConsumerAgent::start(
            broker.clone(),
            bindings(),
            ControlChannel::new(Cursor::new(control)),
            MetricsEmitter::new(LogSink, MetricNames::consumer("t")),
            ConsumerSettings::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn writes_values_one_per_line() {
        let broker = MemoryBroker::new();
        broker.publish(ClusterRole::Primary, "p1", "Key_0", "alpha");
        broker.publish(ClusterRole::Primary, "p2", "Key_1", "beta");
        let mut consumer = agent(&broker, "");
        let mut out: Vec<u8> = Vec::new();
        assert_eq!(consumer.step(&mut out).await.unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "alpha\nbeta\n");
        assert_eq!(broker.committed_offset(ClusterRole::Primary, "1", "p1"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn set_rate_code_is_fatal() {
        let broker = MemoryBroker::new();
        let mut consumer = agent(&broker, "500\n");
        let err = consumer.step(&mut Vec::<u8>::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::UnrecognizedCode(500)));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_commits_before_close() {
        let broker = MemoryBroker::new();
        let mut consumer = agent(&broker, "999");
        consumer.step(&mut Vec::<u8>::new()).await.unwrap();
        let events = broker.events();
        assert!(matches!(events[1], BrokerEvent::Committed { cluster: ClusterRole::Primary, .. }));
        assert!(matches!(events[2], BrokerEvent::ConsumerClosed { cluster: ClusterRole::Primary, .. }));
        assert!(matches!(events[3], BrokerEvent::ConsumerOpened { cluster: ClusterRole::Backup, .. }));
        assert_eq!(consumer.active_role(), ClusterRole::Backup);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_failure_is_not_fatal() {
        let broker = MemoryBroker::new();
        broker.publish(ClusterRole::Primary, "p1", "k", "v");
        broker.fail_commits(true);
        let mut consumer = agent(&broker, "999");
        let mut out: Vec<u8> = Vec::new();
        assert_eq!(consumer.step(&mut out).await.unwrap(), 0);
        assert_eq!(consumer.active_role(), ClusterRole::Backup);
        assert_eq!(broker.live_sessions(), 1);
    }
}
