//! Controller-specific error types.
//!
//! Every variant names the operation and resource kind that failed so log
//! lines are actionable without a backtrace.

use cluster_client::ClusterError;
use crds::DistributionError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the LlamaStack controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// A read or write against the cluster failed
    #[error("failed to {operation} {kind}: {source}")]
    Cluster {
        operation: &'static str,
        kind: &'static str,
        #[source]
        source: ClusterError,
    },

    /// Neither or both of distribution.name / distribution.image are set
    #[error("invalid distribution: {0}")]
    InvalidDistribution(#[from] DistributionError),

    /// Named distribution is not in the image map
    #[error("distribution not found: {0}")]
    DistributionNotFound(String),

    /// A child with our name exists but is controlled by someone else
    #[error("{kind} {name} is controlled by another owner")]
    OwnershipConflict { kind: &'static str, name: String },

    /// Desired child resource could not be built
    #[error("failed to build {kind}: {message}")]
    Build { kind: &'static str, message: String },

    /// Feature flag document is malformed
    #[error("failed to parse feature flags: {0}")]
    FeatureFlags(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics endpoint error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Wraps a cluster error with the operation and kind it came from.
    pub fn cluster(operation: &'static str, kind: &'static str, source: ClusterError) -> Self {
        ControllerError::Cluster { operation, kind, source }
    }

    /// Short label used for the failure metric
    pub fn kind_label(&self) -> &'static str {
        match self {
            ControllerError::Kube(_) => "kube",
            ControllerError::Cluster { source, .. } if source.is_conflict() => "conflict",
            ControllerError::Cluster { .. } => "cluster",
            ControllerError::InvalidDistribution(_) | ControllerError::DistributionNotFound(_) => "distribution",
            ControllerError::OwnershipConflict { .. } => "ownership",
            ControllerError::Build { .. } => "build",
            ControllerError::FeatureFlags(_) | ControllerError::InvalidConfig(_) => "config",
            ControllerError::Metrics(_) => "metrics",
            ControllerError::Watch(_) => "watch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_error_names_operation_and_kind() {
        let err = ControllerError::cluster("create", "Deployment", ClusterError::Api("boom".to_string()));
        let msg = err.to_string();
        assert!(msg.contains("create Deployment"), "got {msg}");
        assert!(msg.contains("boom"), "got {msg}");
        assert_eq!(err.kind_label(), "cluster");
    }

    #[test]
    fn test_conflict_label() {
        let err = ControllerError::cluster("update", "LlamaStackDistribution", ClusterError::Conflict("stale".to_string()));
        assert_eq!(err.kind_label(), "conflict");
    }
}
