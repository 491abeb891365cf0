use anyhow::Result;
use clap::Parser;
use rmrd::cli::{Cli, Commands};
use rmrd::daemon;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Start { config } => daemon::run(config).await?,
    }

    Ok(())
}
