//! Ambient workspace identity
//!
//! Every workspace in the remote control plane contains a `LogicalCluster`
//! object named `cluster` whose `kcp.io/cluster` annotation holds the
//! workspace's logical cluster name. That name is resolved once at startup
//! and scopes every remote call that is not otherwise tenant-qualified.

use crate::error::{ControllerError, Result};
use crate::store::RemoteStore;
use kcp_sync_types::{TenantId, CLUSTER_ANNOTATION};
use tracing::info;

/// Name of the well-known identity object
pub const LOGICAL_CLUSTER_NAME: &str = "cluster";

/// Resolve the identity of the workspace `remote` is connected to.
///
/// Fails without retrying; callers treat any error as fatal.
pub async fn resolve_identity(remote: &dyn RemoteStore) -> Result<TenantId> {
    let logical_cluster = remote
        .logical_cluster()
        .await
        .map_err(ControllerError::IdentityFetch)?;

    let cluster = logical_cluster
        .annotations
        .get(CLUSTER_ANNOTATION)
        .filter(|name| !name.is_empty())
        .ok_or(ControllerError::MissingIdentity)?;

    let tenant = TenantId::new(cluster.as_str())?;
    info!(logical_cluster = %tenant, "Resolved workspace identity");
    Ok(tenant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryRemoteStore, LogicalCluster};

    #[tokio::test]
    async fn test_resolves_annotation() {
        let remote = InMemoryRemoteStore::with_identity("1x2y3z");
        let tenant = resolve_identity(&remote).await.unwrap();
        assert_eq!(tenant.as_str(), "1x2y3z");
    }

    #[tokio::test]
    async fn test_missing_object_is_fatal() {
        let remote = InMemoryRemoteStore::new();
        let err = resolve_identity(&remote).await.unwrap_err();
        assert!(matches!(err, ControllerError::IdentityFetch(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_missing_or_empty_annotation() {
        let remote = InMemoryRemoteStore::new().with_logical_cluster(LogicalCluster {
            name: LOGICAL_CLUSTER_NAME.into(),
            ..Default::default()
        });
        assert!(matches!(
            resolve_identity(&remote).await,
            Err(ControllerError::MissingIdentity)
        ));

        let remote = InMemoryRemoteStore::with_identity("");
        assert!(matches!(
            resolve_identity(&remote).await,
            Err(ControllerError::MissingIdentity)
        ));
    }

    #[tokio::test]
    async fn test_separator_in_identity_is_rejected() {
        let remote = InMemoryRemoteStore::with_identity("root!bad");
        assert!(matches!(
            resolve_identity(&remote).await,
            Err(ControllerError::InvalidIdentity(_))
        ));
    }
}
