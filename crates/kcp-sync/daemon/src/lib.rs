//! kcp-sync daemon library
//!
//! This module provides the pieces `kcp-syncd` is assembled from:
//! - Command line and layered configuration
//! - Kubernetes and kcp store backends
//! - Daemon lifecycle management

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;

pub use backend::{KcpRemoteStore, KubeLocalStore};
pub use cli::Cli;
pub use config::{ConnectionConfig, DaemonConfig, LoggingConfig};
pub use error::{DaemonError, DaemonResult};
pub use server::Daemon;
