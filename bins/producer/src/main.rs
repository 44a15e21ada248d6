mod cmd;

use clap::Parser;
use cmd::config::{Effective, ProducerArgs};

#[derive(Parser)]
#[command(name = "producer", about = "Streams a file to Kafka with operator-driven failover")]
struct Cli {
    #[command(flatten)]
    args: ProducerArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let eff = match Effective::new(&cli.args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    eff.log.init();

    if let Err(e) = cmd::run::run(eff).await {
        tracing::error!(error = %e, "producer stopped");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
