//! Error types for the controller

use kcp_sync_types::{ObjectKey, TenantError, CLUSTER_ANNOTATION};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the local and remote stores
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object already exists or was modified concurrently
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Transport or watch failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Any other API error
    #[error("API error: {0}")]
    Api(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure of a single reconcile pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The local object vanished between enqueue and processing
    #[error("local object {0} not found")]
    ObjectNotFound(ObjectKey),

    /// The object's cluster annotation does not name a valid tenant
    #[error("local object {key} has an invalid {CLUSTER_ANNOTATION} annotation: {source}")]
    InvalidTenant {
        key: ObjectKey,
        #[source]
        source: TenantError,
    },

    /// Reading the local object failed
    #[error("failed to get local object {key}: {source}")]
    LocalFetch {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    /// Reading the remote schema failed
    #[error("failed to get APIResourceSchema {name}: {source}")]
    SchemaFetch {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Creating the remote schema failed
    #[error("failed to create APIResourceSchema {name}: {source}")]
    SchemaCreate {
        name: String,
        #[source]
        source: StoreError,
    },

    /// The pass exceeded its deadline
    #[error("reconcile did not finish within {0:?}")]
    Timeout(Duration),
}

impl ReconcileError {
    /// Terminal errors are reported but never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileError::ObjectNotFound(_) | ReconcileError::InvalidTenant { .. }
        )
    }
}

/// Controller-level errors
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Fetching the identity object from the control plane failed
    #[error("failed to resolve logical cluster identity: {0}")]
    IdentityFetch(#[source] StoreError),

    /// Identity object carries no cluster annotation
    #[error("logical cluster object has no {CLUSTER_ANNOTATION} annotation")]
    MissingIdentity,

    /// Identity annotation is not a usable tenant
    #[error("invalid logical cluster identity: {0}")]
    InvalidIdentity(#[from] TenantError),

    /// Invalid controller configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A controller task panicked or was aborted
    #[error("Task error: {0}")]
    Task(String),
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
