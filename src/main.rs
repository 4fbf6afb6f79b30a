use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use outcome_settlement::application::{Cli, CommandExecutor};
use outcome_settlement::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --log-level wins over RUST_LOG; default info
    let filter = match &cli.global.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // Priority: CLI args > config file > defaults
    let mut config = match &cli.global.config {
        Some(path) => Config::from_file(path).with_context(|| format!("load config {}", path.display()))?,
        None => Config::default(),
    };
    cli.global.apply(&mut config);
    config.validate().context("invalid configuration")?;

    CommandExecutor::new(config).execute(cli.command).await
}
