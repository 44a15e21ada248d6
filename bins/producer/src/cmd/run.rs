use broker_kafka::KafkaBroker;
use control_loop::{ConfiguredSink, ControlChannel, MetricNames, MetricsEmitter, ProducerAgent};
use tokio::io::BufReader;

use super::config::Effective;
use super::error::ProducerError;

pub async fn run(eff: Effective) -> Result<(), ProducerError> {
    let input = tokio::fs::File::open(&eff.input_file)
        .await
        .map_err(|source| ProducerError::Input {
            path: eff.input_file.display().to_string(),
            source,
        })?;
    let control = ControlChannel::open(&eff.pipe_path)?;
    let metrics = MetricsEmitter::new(
        ConfiguredSink::from_sender(eff.metrics_sender),
        MetricNames::producer(),
    );

    tracing::info!(
        input = %eff.input_file.display(),
        pipe = %eff.pipe_path.display(),
        primary = %eff.kafka.primary,
        backup = %eff.kafka.backup,
        "producer starting"
    );
    let agent = ProducerAgent::start(
        KafkaBroker::new(eff.kafka),
        eff.bindings,
        control,
        metrics,
        eff.settings,
    )?;

    let summary = agent.run(BufReader::new(input)).await?;
    tracing::info!(
        sent = summary.sent,
        windows = summary.windows,
        switches = summary.switches,
        cluster = %summary.final_role,
        "producer finished"
    );
    Ok(())
}
