mod common;

use agent_api::ClusterRole;
use broker_memory::{BrokerEvent, MemoryBroker};
use common::{RecordingSink, ScriptedPipe, consumer_bindings};
use control_loop::{
    AgentError, ConsumerAgent, ConsumerSettings, ControlChannel, MetricNames, MetricsEmitter,
};

type Agent = ConsumerAgent<MemoryBroker, ScriptedPipe, RecordingSink>;

fn start(broker: &MemoryBroker, pipe: &ScriptedPipe, sink: &RecordingSink) -> Agent {
    ConsumerAgent::start(
        broker.clone(),
        consumer_bindings(),
        ControlChannel::new(pipe.clone()),
        MetricsEmitter::new(sink.clone(), MetricNames::consumer("dash")),
        ConsumerSettings::default(),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn failover_commits_primary_then_reads_backup_pair() {
    let broker = MemoryBroker::new();
    broker.publish(ClusterRole::Primary, "orders", "Key_0", "m0");
    broker.publish(ClusterRole::Primary, "audit", "Key_1", "m1");
    broker.publish(ClusterRole::Backup, "audit-dr", "Key_2", "b0");

    let pipe = ScriptedPipe::default();
    let sink = RecordingSink::default();
    let mut consumer = start(&broker, &pipe, &sink);
    let mut out: Vec<u8> = Vec::new();

    assert_eq!(consumer.step(&mut out).await.unwrap(), 2);
    pipe.push("999\n");
    assert_eq!(consumer.step(&mut out).await.unwrap(), 1);

    assert_eq!(String::from_utf8(out).unwrap(), "m0\nm1\nb0\n");
    assert_eq!(consumer.active_role(), ClusterRole::Backup);
    assert_eq!(broker.committed_offset(ClusterRole::Primary, "1", "orders"), Some(1));
    assert_eq!(broker.committed_offset(ClusterRole::Primary, "1", "audit"), Some(1));

    let events = broker.events();
    let closed = events
        .iter()
        .position(|e| matches!(e, BrokerEvent::ConsumerClosed { cluster: ClusterRole::Primary, .. }))
        .unwrap();
    assert!(matches!(
        events[closed - 1],
        BrokerEvent::Committed { cluster: ClusterRole::Primary, .. }
    ));
    assert_eq!(
        events[closed + 1],
        BrokerEvent::ConsumerOpened {
            cluster: ClusterRole::Backup,
            topics: vec!["orders-dr".into(), "audit-dr".into()],
            group: "1".into(),
        }
    );
    assert_eq!(broker.max_live_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_code_stops_before_polling() {
    let broker = MemoryBroker::new();
    broker.publish(ClusterRole::Primary, "orders", "Key_0", "never");
    let pipe = ScriptedPipe::checks(&["500\n"]);
    let sink = RecordingSink::default();
    let mut consumer = start(&broker, &pipe, &sink);
    let mut out: Vec<u8> = Vec::new();

    let err = consumer.step(&mut out).await.unwrap_err();
    assert!(matches!(err, AgentError::UnrecognizedCode(500)));
    assert_eq!(broker.polls(), 0);
    assert!(out.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_ends_with_the_fatal_error() {
    let broker = MemoryBroker::new();
    let pipe = ScriptedPipe::checks(&["", "", "7"]);
    let sink = RecordingSink::default();
    let consumer = start(&broker, &pipe, &sink);

    let err = consumer.run(Vec::<u8>::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::UnrecognizedCode(7)));
    assert_eq!(broker.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failback_while_primary_is_harmless() {
    let broker = MemoryBroker::new();
    let pipe = ScriptedPipe::checks(&["998", "998"]);
    let sink = RecordingSink::default();
    let mut consumer = start(&broker, &pipe, &sink);

    consumer.step(&mut Vec::<u8>::new()).await.unwrap();
    consumer.step(&mut Vec::<u8>::new()).await.unwrap();

    assert_eq!(consumer.active_role(), ClusterRole::Primary);
    assert_eq!(consumer.switches(), 2);
    let opened: Vec<_> = broker
        .events()
        .into_iter()
        .filter_map(|e| match e {
            BrokerEvent::ConsumerOpened { cluster, topics, .. } => Some((cluster, topics)),
            _ => None,
        })
        .collect();
    assert_eq!(opened.len(), 3);
    assert!(opened.iter().all(|(cluster, topics)| {
        *cluster == ClusterRole::Primary && topics == &vec!["orders".to_string(), "audit".to_string()]
    }));
}

#[tokio::test(start_paused = true)]
async fn counters_survive_failover() {
    let broker = MemoryBroker::new();
    for i in 0..3 {
        broker.publish(ClusterRole::Primary, "orders", &format!("Key_{i}"), "x");
    }
    let pipe = ScriptedPipe::checks(&["", "999"]);
    let sink = RecordingSink::default();
    let mut consumer = start(&broker, &pipe, &sink);
    let mut out: Vec<u8> = Vec::new();

    // Primary batch, then switch and an empty backup poll that spans a second.
    consumer.step(&mut out).await.unwrap();
    consumer.step(&mut out).await.unwrap();
    assert!(sink.sent().is_empty());

    // The first report after the switch still counts the primary batch.
    consumer.step(&mut out).await.unwrap();
    assert_eq!(
        sink.sent(),
        vec![
            ("consumer_dash.backup_rate".to_string(), 3),
            ("consumer_dash.primary_rate".to_string(), 0),
        ]
    );
    assert_eq!(consumer.consumed(), 3);
}

#[tokio::test(start_paused = true)]
async fn commit_failures_are_logged_only() {
    let broker = MemoryBroker::new();
    broker.publish(ClusterRole::Primary, "orders", "Key_0", "v");
    broker.fail_commits(true);
    let pipe = ScriptedPipe::default();
    let sink = RecordingSink::failing();
    let mut consumer = start(&broker, &pipe, &sink);
    let mut out: Vec<u8> = Vec::new();

    assert_eq!(consumer.step(&mut out).await.unwrap(), 1);
    assert_eq!(consumer.step(&mut out).await.unwrap(), 0);
    assert_eq!(consumer.step(&mut out).await.unwrap(), 0);
    assert_eq!(String::from_utf8(out).unwrap(), "v\n");
    assert_eq!(broker.committed_offset(ClusterRole::Primary, "1", "orders"), None);
    // The metrics sink failed too; both values were still attempted.
    assert_eq!(sink.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unreachable_primary_fails_startup() {
    let broker = MemoryBroker::new();
    broker.fail_connects(1);
    let result = ConsumerAgent::start(
        broker.clone(),
        consumer_bindings(),
        ControlChannel::new(ScriptedPipe::default()),
        MetricsEmitter::new(RecordingSink::default(), MetricNames::consumer("dash")),
        ConsumerSettings::default(),
    );
    assert!(matches!(
        result,
        Err(AgentError::Broker { cluster: ClusterRole::Primary, .. })
    ));
}
