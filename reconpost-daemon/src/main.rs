use anyhow::Result;
use clap::Parser;

use reconpost_core::config::ReconpostConfig;
use reconpost_daemon::cli::DaemonCli;
use reconpost_daemon::daemon::{Daemon, apply_cli_overrides};
use reconpost_daemon::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Config precedence: file, then environment, then CLI flags
    let mut config = ReconpostConfig::load_or_default(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    apply_cli_overrides(&mut config, &cli)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "reconpost-daemon starting"
    );

    let daemon = Daemon::build_from_config(config)?;
    daemon.run().await
}
