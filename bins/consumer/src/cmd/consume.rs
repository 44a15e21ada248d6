use std::io::BufWriter;

use broker_kafka::KafkaBroker;
use control_loop::{ConfiguredSink, ConsumerAgent, ControlChannel, MetricNames, MetricsEmitter};

use crate::config::Effective;
use crate::error::ConsumerError;

/// Consume until a fatal error. Payloads go to stdout, one per line.
pub async fn run(eff: Effective) -> Result<(), ConsumerError> {
    let control = ControlChannel::open(&eff.pipe_path)?;
    let metrics = MetricsEmitter::new(
        ConfiguredSink::from_sender(eff.metrics_sender),
        MetricNames::consumer(&eff.metrics_name),
    );

    tracing::info!(
        pipe = %eff.pipe_path.display(),
        metrics = %eff.metrics_name,
        primary = %eff.kafka.primary,
        backup = %eff.kafka.backup,
        "consumer starting"
    );
    let agent = ConsumerAgent::start(
        KafkaBroker::new(eff.kafka),
        eff.bindings,
        control,
        metrics,
        eff.settings,
    )?;

    let out = BufWriter::new(std::io::stdout().lock());
    agent.run(out).await?;
    Ok(())
}
