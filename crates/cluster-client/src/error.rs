//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Kubernetes client/transport error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Optimistic concurrency conflict (stale resourceVersion)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found where one was required
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error while building a request
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API returned an error that is not covered above
    #[error("API error: {0}")]
    Api(String),
}

impl ClusterError {
    /// Maps a kube error, turning HTTP 409 into [`ClusterError::Conflict`].
    pub fn from_kube(err: kube::Error, context: impl std::fmt::Display) -> Self {
        match err {
            kube::Error::Api(ref status) if status.code == 409 => {
                ClusterError::Conflict(format!("{}: {}", context, status.message))
            }
            kube::Error::Api(ref status) if status.code == 404 => {
                ClusterError::NotFound(format!("{}: {}", context, status.message))
            }
            other => ClusterError::Kube(other),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }
}
