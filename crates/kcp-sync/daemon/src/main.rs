//! kcp-syncd - Workspace-aware reconciliation daemon
//!
//! Watches ConfigMaps in the local cluster and makes sure the workspace each
//! one belongs to holds the controller's APIResourceSchema.

use anyhow::Context;
use clap::Parser;
use kcp_sync_daemon::{Cli, Daemon, DaemonConfig, DaemonError, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);

    init_tracing(&config.logging);

    let errors = config.validate();
    if !errors.is_empty() {
        let err = DaemonError::Config(errors.join("; "));
        tracing::error!(error = %err, "Invalid command line");
        return Err(err.into());
    }

    if let Err(err) = Daemon::new(config).run().await {
        tracing::error!(error = %err, "kcp-syncd has encountered an error");
        return Err(err.into());
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
