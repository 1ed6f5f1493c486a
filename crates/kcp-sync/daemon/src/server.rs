//! Daemon setup and lifecycle management

use crate::backend::{KcpRemoteStore, KubeLocalStore};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use kcp_sync_controller::{Controller, CONTROLLER_NAME};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// kcp-sync daemon
pub struct Daemon {
    config: DaemonConfig,
}

impl Daemon {
    /// Create a daemon from a validated configuration
    pub fn new(config: DaemonConfig) -> Self {
        Self { config }
    }

    /// Connect to both clusters, bootstrap the controller and run until a
    /// shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        tracing::info!("Moin!");

        let local_config = match &self.config.connection.kubeconfig {
            Some(path) => load_kubeconfig(path).await?,
            None => Config::infer().await?,
        };
        tracing::info!(host = %local_config.cluster_url, "--kubeconfig (local) info");

        let kcp_path = self
            .config
            .connection
            .kcp_kubeconfig
            .as_deref()
            .ok_or_else(|| DaemonError::Config("--kcp-kubeconfig is required".to_string()))?;
        let kcp_config = load_kubeconfig(kcp_path).await?;
        tracing::info!(host = %kcp_config.cluster_url, "--kcp-kubeconfig (kcp) info");

        let local = Arc::new(KubeLocalStore::new(
            Client::try_from(local_config)?,
            CONTROLLER_NAME,
        ));
        let remote = Arc::new(KcpRemoteStore::new(kcp_config)?);

        let controller = Controller::bootstrap(self.config.controller.clone(), local, remote).await?;

        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            signal_cancel.cancel();
        });

        tracing::info!("Starting controller");
        controller.run(cancel).await?;

        tracing::info!("kcp-syncd shutting down");
        Ok(())
    }
}

/// Load a client config from an explicit kubeconfig file
async fn load_kubeconfig(path: &Path) -> DaemonResult<Config> {
    let kubeconfig = Kubeconfig::read_from(path)?;
    Ok(Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_kubeconfig_file_is_a_client_error() {
        let result = tokio_test::block_on(load_kubeconfig(Path::new("/nonexistent/kcp.kubeconfig")));
        assert!(matches!(result, Err(DaemonError::Client(_))));
    }
}
