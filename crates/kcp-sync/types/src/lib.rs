//! kcp-sync Types - Core types for workspace-aware reconciliation
//!
//! kcp-sync mirrors objects observed in a local cluster into a multi-tenant
//! control plane that partitions its API by logical cluster (workspace).
//!
//! ## Key Concepts
//!
//! - **TenantId**: Identity of one logical cluster in the remote control plane
//! - **RequestKey**: Queue key carrying tenant, namespace and name
//! - **LocalObject**: Snapshot of a watched object in the local cluster
//! - **ApiResourceSchema**: Remote resource kept in existence per tenant

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod key;
pub mod object;
pub mod schema;
pub mod tenant;

// Re-export main types
pub use key::{KeyError, ObjectKey, RequestKey, KEY_SEPARATOR};
pub use object::{LocalObject, CLUSTER_ANNOTATION};
pub use schema::{
    ApiResourceSchema, ApiResourceSchemaSpec, ApiResourceVersion, ResourceNames, ResourceScope,
};
pub use tenant::{TenantError, TenantId};
