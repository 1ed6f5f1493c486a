//! Kubernetes-backed store implementations
//!
//! [`KubeLocalStore`] watches ConfigMaps in the local cluster and records
//! events against them. [`KcpRemoteStore`] talks to kcp, addressing each
//! logical cluster through its `/clusters/<name>` path.

mod local;
mod remote;

pub use local::{local_object, object_reference, KubeLocalStore};
pub use remote::{schema_from_dynamic, schema_to_dynamic, workspace_url, KcpRemoteStore};

use kcp_sync_controller::StoreError;

/// Map a client error onto the store error the controller understands
pub fn store_error(err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => StoreError::NotFound(response.message),
            409 => StoreError::Conflict(response.message),
            422 | 400 => StoreError::InvalidData(response.message),
            _ => StoreError::Api(format!("{} ({})", response.message, response.code)),
        },
        other => StoreError::Connection(other.to_string()),
    }
}
