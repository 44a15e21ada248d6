mod config;
mod error;

use clap::Parser;
use config::{Cli, Effective};

mod cmd;

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

    if let Err(e) = cmd::consume::run(eff).await {
        tracing::error!(error = %e, "consumer stopped");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
