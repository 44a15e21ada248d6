use std::io::Read;
use std::time::Duration;

use agent_api::{Bindings, Broker, BrokerError, ClusterRole, PendingRecord, ProducerSession, TopicBinding};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::DEFAULT_RATE;
use crate::control::{ControlChannel, ProducerCommand};
use crate::error::AgentError;
use crate::governor::RateGovernor;
use crate::metrics::{MetricsEmitter, MetricsSink};
use crate::session::{Binder, SessionManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSettings {
    pub initial_rate: u32,
    /// Upper bound for the flush at end of input.
    pub shutdown_flush: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            initial_rate: DEFAULT_RATE,
            shutdown_flush: Duration::from_millis(5000),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Binder
// ═══════════════════════════════════════════════════════════════

/// Producer sessions publish to the first topic of a binding.
pub struct ProducerBinder<B> {
    broker: B,
}

impl<B> ProducerBinder<B> {
    pub fn new(broker: B) -> Self {
        Self { broker }
    }
}

impl<B: Broker> Binder for ProducerBinder<B> {
    type Session = B::Producer;

    fn open(&self, cluster: ClusterRole, binding: &TopicBinding) -> Result<B::Producer, BrokerError> {
        self.broker.connect_producer(cluster, binding.topic())
    }

    /// Destroys the producer without flushing. Records still buffered at
    /// a failover may be lost.
    fn teardown(&self, _cluster: ClusterRole, session: B::Producer) -> Result<(), BrokerError> {
        session.close()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Agent
// ═══════════════════════════════════════════════════════════════

/// Counters returned when input is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Records submitted.
    pub sent: u64,
    /// Pacing windows opened, the final partial one included.
    pub windows: u64,
    /// Records submitted in the final window.
    pub last_window: u32,
    /// Role switches applied, repeats included.
    pub switches: u64,
    /// Role active at shutdown.
    pub final_role: ClusterRole,
}

/// Streams input lines to the active cluster at a governed rate.
pub struct ProducerAgent<B: Broker, R, M> {
    sessions: SessionManager<ProducerBinder<B>>,
    governor: RateGovernor,
    control: ControlChannel<R>,
    metrics: MetricsEmitter<M>,
    shutdown_flush: Duration,
    next_seq: u64,
    closed_windows: u64,
}

impl<B, R, M> ProducerAgent<B, R, M>
where
    B: Broker,
    R: Read,
    M: MetricsSink,
{
    /// Open the primary producer. Fails if the primary is unreachable.
    pub fn start(
        broker: B,
        bindings: Bindings,
        control: ControlChannel<R>,
        metrics: MetricsEmitter<M>,
        settings: ProducerSettings,
    ) -> Result<Self, AgentError> {
        let sessions = SessionManager::start(ProducerBinder::new(broker), bindings)?;
        tracing::info!(
            rate = settings.initial_rate,
            topic = sessions.active_binding().topic(),
            "producer started"
        );
        Ok(Self {
            sessions,
            governor: RateGovernor::new(settings.initial_rate),
            control,
            metrics,
            shutdown_flush: settings.shutdown_flush,
            next_seq: 0,
            closed_windows: 0,
        })
    }

    pub fn active_role(&self) -> ClusterRole {
        self.sessions.active_role()
    }

    pub fn rate(&self) -> u32 {
        self.governor.rate()
    }

    /// Submit every line of `input`, then flush and close.
    ///
    /// Lines are raw bytes up to `\n`, with a trailing `\r` dropped; no
    /// encoding is assumed. Window boundaries are handled before the next
    /// line is read, so a boundary never swallows a line.
    pub async fn run<L>(mut self, mut input: L) -> Result<ProducerSummary, AgentError>
    where
        L: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        self.metrics
            .report(self.active_role(), i64::from(self.governor.rate()))
            .await;

        loop {
            if self.governor.window_full() {
                self.close_window().await?;
                continue;
            }
            line.clear();
            let n = input
                .read_until(b'\n', &mut line)
                .await
                .map_err(AgentError::Input)?;
            if n == 0 {
                break;
            }
            self.submit(trim_newline(&line))?;
        }

        let last_window = self.governor.sent_in_window();
        let role = self.active_role();
        tracing::info!(sent = self.next_seq, cluster = %role, "end of input");
        self.metrics.report(role, 0).await;

        let flush_timeout = self.shutdown_flush;
        if let Err(e) = self.sessions.session()?.flush(flush_timeout) {
            tracing::warn!(cluster = %role, error = %e, "flush at shutdown incomplete");
        }

        let summary = ProducerSummary {
            sent: self.next_seq,
            windows: self.closed_windows + 1,
            last_window,
            switches: self.sessions.switches(),
            final_role: role,
        };
        self.sessions.shutdown()?;
        Ok(summary)
    }

    fn submit(&mut self, line: &[u8]) -> Result<(), AgentError> {
        let role = self.sessions.active_role();
        let record = PendingRecord::new(self.next_seq, line);
        tracing::trace!(seq = record.seq(), len = line.len(), "sending");
        self.sessions
            .session()?
            .submit(record)
            .map_err(|e| AgentError::broker(role, e))?;
        self.next_seq += 1;
        self.governor.record_sent();
        Ok(())
    }

    /// Report, sleep out the window, then act on at most one command.
    async fn close_window(&mut self) -> Result<(), AgentError> {
        self.metrics
            .report(self.active_role(), i64::from(self.governor.rate()))
            .await;
        self.governor.close_window().await;
        self.closed_windows += 1;

        let Some(code) = self.control.poll_code()? else {
            return Ok(());
        };
        let command = ProducerCommand::from_code(code);
        tracing::info!(code, ?command, "control command");

        if let ProducerCommand::SetRate(rate) = command {
            tracing::info!(from = self.governor.rate(), to = rate, "rate changed");
            self.governor.set_rate(rate);
            self.metrics
                .report(self.active_role(), i64::from(rate))
                .await;
        } else if let Some(transition) = command.transition() {
            self.sessions.switch(transition)?;
        }
        Ok(())
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_memory::{BrokerEvent, MemoryBroker};
    use std::io::Cursor;

    use crate::metrics::{LogSink, MetricNames};

    fn bindings() -> Bindings {
        Bindings::new(TopicBinding::single("prim"), TopicBinding::single("back"))
    }

    fn agent(
        broker: &MemoryBroker,
        control: &'static str,
        rate: u32,
    ) -> ProducerAgent<MemoryBroker, Cursor<&'static str>, LogSink> {
        ProducerAgent::start(
            broker.clone(),
            bindings(),
            ControlChannel::new(Cursor::new(control)),
            MetricsEmitter::new(LogSink, MetricNames::producer()),
            ProducerSettings {
                initial_rate: rate,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_flushes_and_closes() {
        let broker = MemoryBroker::new();
        let summary = agent(&broker, "", 10).run(&b""[..]).await.unwrap();
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.windows, 1);
        assert_eq!(summary.last_window, 0);
        assert_eq!(
            broker.events(),
            vec![
                BrokerEvent::ProducerOpened { cluster: ClusterRole::Primary, topic: "prim".into() },
                BrokerEvent::ProducerFlushed { cluster: ClusterRole::Primary, topic: "prim".into() },
                BrokerEvent::ProducerClosed { cluster: ClusterRole::Primary, topic: "prim".into() },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn keys_follow_line_numbers() {
        let broker = MemoryBroker::new();
        agent(&broker, "", 100).run(&b"a\nb\nc"[..]).await.unwrap();
        assert_eq!(broker.keys(ClusterRole::Primary, "prim"), vec!["Key_0", "Key_1", "Key_2"]);
        assert_eq!(broker.values(ClusterRole::Primary, "prim"), vec!["a", "b", "c"]);
        assert_eq!(broker.completions(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn crlf_and_missing_final_newline_are_trimmed() {
        let broker = MemoryBroker::new();
        agent(&broker, "", 100).run(&b"a\r\n\r\nb"[..]).await.unwrap();
        assert_eq!(
            broker.payloads(ClusterRole::Primary, "prim"),
            vec![b"a".to_vec(), Vec::new(), b"b".to_vec()]
        );
    }

    #[test]
    fn trim_newline_drops_only_the_terminator() {
        assert_eq!(trim_newline(b"x\r\n"), b"x");
        assert_eq!(trim_newline(b"x\n"), b"x");
        assert_eq!(trim_newline(b"x\r"), b"x");
        assert_eq!(trim_newline(b"x\ry"), b"x\ry");
    }

    #[tokio::test(start_paused = true)]
    async fn failover_does_not_flush() {
        let broker = MemoryBroker::new();
        agent(&broker, "999", 1).run(&b"x\ny"[..]).await.unwrap();
        let events = broker.events();
        assert_eq!(
            events[1],
            BrokerEvent::ProducerClosed { cluster: ClusterRole::Primary, topic: "prim".into() }
        );
        assert_eq!(
            events[2],
            BrokerEvent::ProducerOpened { cluster: ClusterRole::Backup, topic: "back".into() }
        );
        assert_eq!(broker.values(ClusterRole::Backup, "back"), vec!["y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_control_token_stops_the_agent() {
        let broker = MemoryBroker::new();
        let err = agent(&broker, "fast ", 1).run(&b"x\ny"[..]).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedCommand(ref t) if t == "fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_primary_fails_startup() {
        let broker = MemoryBroker::new();
        broker.fail_connects(1);
        let result = ProducerAgent::start(
            broker.clone(),
            bindings(),
            ControlChannel::new(Cursor::new("")),
            MetricsEmitter::new(LogSink, MetricNames::producer()),
            ProducerSettings::default(),
        );
        assert!(matches!(
            result,
            Err(AgentError::Broker { cluster: ClusterRole::Primary, .. })
        ));
    }
}
