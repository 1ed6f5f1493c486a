//! Configuration for kcp-syncd

use kcp_sync_controller::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Worker pool and queue settings
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Cluster connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the two API servers are found
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Kubeconfig of the local cluster; inferred when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig pointing at a kcp workspace
    #[serde(default)]
    pub kcp_kubeconfig: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// Environment variables use the `KCP_SYNC_` prefix and `__` between
    /// nesting levels, e.g. `KCP_SYNC_CONTROLLER__WORKERS=8`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KCP_SYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Collect every problem with the configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.connection.kcp_kubeconfig.is_none() {
            errors.push("--kcp-kubeconfig is required".to_string());
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            errors.push(format!("invalid log level: {}", self.logging.level));
        }

        errors.extend(self.controller.validate());
        errors
    }
}
