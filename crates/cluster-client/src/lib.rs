//! Kubernetes resource store client
//!
//! Abstracts the reads and writes the LlamaStack operator performs against
//! the Kubernetes API behind the [`ClusterClient`] trait.
//!
//! - [`KubeClusterClient`]: real implementation over `kube::Api`
//! - `MockClusterClient` (feature `test-util`): in-memory implementation

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{status_patch, KubeClusterClient, FIELD_MANAGER};
pub use cluster_trait::ClusterClient;
pub use error::ClusterError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockClusterClient;
