//! Command line interface

use crate::config::DaemonConfig;
use clap::Parser;
use std::path::PathBuf;

/// kcp-sync daemon
#[derive(Debug, Parser)]
#[command(name = "kcp-syncd")]
#[command(about = "kcp-syncd - Keeps an APIResourceSchema in every workspace that owns a local object", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "KCP_SYNC_CONFIG")]
    pub config: Option<String>,

    /// Kubeconfig of the local cluster
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig file for kcp
    #[arg(long, env = "KCP_KUBECONFIG")]
    pub kcp_kubeconfig: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Log level
    #[arg(long, env = "KCP_SYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "KCP_SYNC_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    /// Override loaded configuration with whatever was given on the command line
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(path) = &self.kubeconfig {
            config.connection.kubeconfig = Some(path.clone());
        }
        if let Some(path) = &self.kcp_kubeconfig {
            config.connection.kcp_kubeconfig = Some(path.clone());
        }
        if let Some(workers) = self.workers {
            config.controller.workers = workers;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}
