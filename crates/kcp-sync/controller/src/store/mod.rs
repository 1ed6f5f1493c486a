//! Store abstractions for the local cluster and the remote control plane
//!
//! The controller only talks to the stores through these traits. The daemon
//! provides Kubernetes-backed implementations; the in-memory ones are used
//! for development and testing.

mod memory;
mod traits;

pub use memory::{InMemoryLocalStore, InMemoryRemoteStore};
pub use traits::{EventType, LocalStore, LogicalCluster, ObjectEvent, RemoteStore, WatchEvent};
