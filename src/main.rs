mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use netlab::{LabConfig, LabRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    let mut config = LabConfig::load()?;
    config.labfile_path = std::path::PathBuf::from(&cli.config);
    config.verbose = cli.verbose;

    let runtime = LabRuntime::new(config)?;
    let verb = cli.command.unwrap_or(Commands::Start).into_verb();

    info!(
        "🧪 netlab {:?} for project '{}'",
        verb,
        runtime.environment().project
    );

    runtime.execute(&verb).await?;

    Ok(())
}
