//! Kubernetes-backed ClusterClient
//!
//! Thin wrapper over `kube::Api` that maps 404s to `None` and 409s to
//! [`ClusterError::Conflict`].

use crate::error::ClusterError;
use crate::cluster_trait::ClusterClient;
use crds::{LlamaStackDistribution, LlamaStackDistributionStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Field manager recorded on writes made by the operator
pub const FIELD_MANAGER: &str = "llama-stack-operator";

/// Merge patch body that writes the whole status subresource.
///
/// Every status field serializes, empty or not, so a cleared list or unset
/// field overwrites what the server holds. With a resourceVersion the patch
/// becomes a compare-and-swap and a stale version is rejected with 409.
pub fn status_patch(
    status: &LlamaStackDistributionStatus,
    resource_version: Option<&str>,
) -> Result<serde_json::Value, ClusterError> {
    let mut patch = serde_json::json!({ "status": serde_json::to_value(status)? });
    if let Some(rv) = resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    Ok(patch)
}

/// Kubernetes API client
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Create a new cluster client from an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, ClusterError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(namespace);
        let kind = K::kind(&Default::default()).to_string();
        debug!("GET {} {}/{}", kind, namespace, name);
        api.get_opt(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("get {} {}/{}", kind, namespace, name)))
    }

    async fn create<K>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(namespace);
        let kind = K::kind(&Default::default()).to_string();
        let name = obj.meta().name.clone().unwrap_or_default();
        debug!("CREATE {} {}/{}", kind, namespace, name);
        api.create(&Self::post_params(), obj)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("create {} {}/{}", kind, namespace, name)))
    }

    async fn replace<K>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(namespace);
        let kind = K::kind(&Default::default()).to_string();
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or_else(|| ClusterError::Api(format!("cannot replace {} without a name", kind)))?;
        debug!("REPLACE {} {}/{}", kind, namespace, name);
        api.replace(&name, &Self::post_params(), obj)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("replace {} {}/{}", kind, namespace, name)))
    }
}

#[async_trait::async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_distribution(&self, namespace: &str, name: &str) -> Result<Option<LlamaStackDistribution>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn update_distribution_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        status: &LlamaStackDistributionStatus,
    ) -> Result<(), ClusterError> {
        let api: Api<LlamaStackDistribution> = self.api(namespace);
        let patch = status_patch(status, resource_version)?;

        let pp = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.patch_status(name, &pp, &Patch::Merge(&patch))
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("update status of LlamaStackDistribution {}/{}", namespace, name)))?;
        Ok(())
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn create_pvc(&self, namespace: &str, pvc: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim, ClusterError> {
        self.create(namespace, pvc).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        self.create(namespace, deployment).await
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        self.replace(namespace, deployment).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        self.create(namespace, service).await
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        self.replace(namespace, service).await
    }

    async fn get_network_policy(&self, namespace: &str, name: &str) -> Result<Option<NetworkPolicy>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn create_network_policy(&self, namespace: &str, policy: &NetworkPolicy) -> Result<NetworkPolicy, ClusterError> {
        self.create(namespace, policy).await
    }

    async fn replace_network_policy(&self, namespace: &str, policy: &NetworkPolicy) -> Result<NetworkPolicy, ClusterError> {
        self.replace(namespace, policy).await
    }

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        let api: Api<NetworkPolicy> = self.api(namespace);
        debug!("DELETE NetworkPolicy {}/{}", namespace, name);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(status)) if status.code == 404 => Ok(false),
            Err(e) => Err(ClusterError::from_kube(e, format!("delete NetworkPolicy {}/{}", namespace, name))),
        }
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap) -> Result<ConfigMap, ClusterError> {
        self.create(namespace, config_map).await
    }
}
