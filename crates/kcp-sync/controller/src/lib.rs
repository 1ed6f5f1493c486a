//! # kcp-sync Controller
//!
//! Workspace-aware reconciliation core: watches objects in a local cluster
//! and keeps an APIResourceSchema in existence in the logical cluster each
//! object belongs to.
//!
//! ## Key Components
//!
//! - [`resolve_identity`]: resolves the ambient workspace at startup
//! - [`EventPipeline`]: turns change notifications into request keys
//! - [`WorkQueue`]: deduplicating FIFO with per-key backoff
//! - [`WorkerPool`]: runs the per-key state machine on N workers
//! - [`SchemaReconciler`]: idempotent "ensure schema exists" step
//! - [`Controller`]: bootstrap and lifecycle around all of the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kcp_sync_controller::{
//!     Controller, ControllerConfig, InMemoryLocalStore, InMemoryRemoteStore,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> kcp_sync_controller::Result<()> {
//! let controller = Controller::bootstrap(
//!     ControllerConfig::default(),
//!     Arc::new(InMemoryLocalStore::new()),
//!     Arc::new(InMemoryRemoteStore::with_identity("root")),
//! )
//! .await?;
//!
//! let cancel = CancellationToken::new();
//! controller.run(cancel).await
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod queue;
pub mod reconciler;
pub mod store;
pub mod worker;

// Re-exports
pub use config::{ControllerConfig, NotFoundPolicy};
pub use controller::{Controller, CONTROLLER_NAME};
pub use error::{ControllerError, ReconcileError, Result, StoreError, StoreResult};
pub use identity::{resolve_identity, LOGICAL_CLUSTER_NAME};
pub use pipeline::EventPipeline;
pub use queue::WorkQueue;
pub use reconciler::{desired_schema, Reconcile, SchemaReconciler, SCHEMA_NAME};
pub use store::{
    EventType, InMemoryLocalStore, InMemoryRemoteStore, LocalStore, LogicalCluster, ObjectEvent,
    RemoteStore, WatchEvent,
};
pub use worker::{ReconcileOutcome, WorkerPool, RECONCILE_ERROR_REASON};
