//! Error types for kcp-syncd

use kcp_sync_controller::ControllerError;
use thiserror::Error;

/// Daemon-level errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A cluster client could not be built
    #[error("Client error: {0}")]
    Client(String),

    /// The workspace identity could not be resolved
    #[error("Identity error: {0}")]
    Identity(#[source] ControllerError),

    /// The controller stopped abnormally
    #[error("Controller error: {0}")]
    Controller(#[source] ControllerError),
}

impl From<ControllerError> for DaemonError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Config(msg) => DaemonError::Config(msg),
            ControllerError::IdentityFetch(_)
            | ControllerError::MissingIdentity
            | ControllerError::InvalidIdentity(_) => DaemonError::Identity(err),
            ControllerError::Task(_) => DaemonError::Controller(err),
        }
    }
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}

impl From<kube::Error> for DaemonError {
    fn from(err: kube::Error) -> Self {
        DaemonError::Client(err.to_string())
    }
}

impl From<kube::config::KubeconfigError> for DaemonError {
    fn from(err: kube::config::KubeconfigError) -> Self {
        DaemonError::Client(err.to_string())
    }
}

impl From<kube::config::InferConfigError> for DaemonError {
    fn from(err: kube::config::InferConfigError) -> Self {
        DaemonError::Client(err.to_string())
    }
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kcp_sync_controller::StoreError;

    #[test]
    fn test_identity_errors_map_to_identity() {
        let err: DaemonError = ControllerError::MissingIdentity.into();
        assert!(matches!(err, DaemonError::Identity(_)));

        let err: DaemonError =
            ControllerError::IdentityFetch(StoreError::NotFound("cluster".into())).into();
        assert!(matches!(err, DaemonError::Identity(_)));
    }

    #[test]
    fn test_config_error_keeps_message() {
        let err: DaemonError = ControllerError::Config("workers must be at least 1".into()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: workers must be at least 1"
        );
    }

    #[test]
    fn test_task_error_maps_to_controller() {
        let err: DaemonError = ControllerError::Task("worker panicked".into()).into();
        assert!(matches!(err, DaemonError::Controller(_)));
    }
}
