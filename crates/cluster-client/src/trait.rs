//! ClusterClient trait for mocking
//!
//! This trait abstracts the Kubernetes resource store so the reconciler can
//! be unit tested against an in-memory implementation.

use crate::error::ClusterError;
use crds::{LlamaStackDistribution, LlamaStackDistributionStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;

/// Trait for Kubernetes resource store operations
///
/// Reads return `Ok(None)` for missing objects. Writes are plain
/// create/replace calls; create-or-update policy lives in the caller.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    // LlamaStackDistribution
    async fn get_distribution(&self, namespace: &str, name: &str) -> Result<Option<LlamaStackDistribution>, ClusterError>;
    /// Writes the full status. `resource_version` is the version the status
    /// was computed from; a stale version yields [`ClusterError::Conflict`].
    async fn update_distribution_status(&self, namespace: &str, name: &str, resource_version: Option<&str>, status: &LlamaStackDistributionStatus) -> Result<(), ClusterError>;

    // PersistentVolumeClaim
    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, ClusterError>;
    async fn create_pvc(&self, namespace: &str, pvc: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim, ClusterError>;

    // Deployment
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError>;
    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError>;
    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError>;

    // Service
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError>;
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError>;
    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError>;

    // NetworkPolicy
    async fn get_network_policy(&self, namespace: &str, name: &str) -> Result<Option<NetworkPolicy>, ClusterError>;
    async fn create_network_policy(&self, namespace: &str, policy: &NetworkPolicy) -> Result<NetworkPolicy, ClusterError>;
    async fn replace_network_policy(&self, namespace: &str, policy: &NetworkPolicy) -> Result<NetworkPolicy, ClusterError>;
    /// Deletes the policy. Returns `Ok(false)` if it did not exist.
    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;

    // ConfigMap
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, ClusterError>;
    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap) -> Result<ConfigMap, ClusterError>;
}
