//! Mock ClusterClient for unit testing
//!
//! Stores objects in memory, assigns resource versions and records every
//! write so tests can assert idempotence.

use crate::client::status_patch;
use crate::cluster_trait::ClusterClient;
use crate::error::ClusterError;
use crds::{LlamaStackDistribution, LlamaStackDistributionStatus};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, PersistentVolumeClaimStatus, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::Resource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Store<T> = Arc<Mutex<HashMap<(String, String), T>>>;

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    pub(crate) distributions: Store<LlamaStackDistribution>,
    pub(crate) pvcs: Store<PersistentVolumeClaim>,
    pub(crate) deployments: Store<Deployment>,
    pub(crate) services: Store<Service>,
    pub(crate) network_policies: Store<NetworkPolicy>,
    pub(crate) config_maps: Store<ConfigMap>,
    /// Every write, in order ("create Deployment ns/name", ...)
    pub(crate) writes: Arc<Mutex<Vec<String>>>,
    pub(crate) next_version: Arc<Mutex<u64>>,
    pub(crate) status_update_error: Arc<Mutex<Option<String>>>,
    pub(crate) deployment_read_error: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for MockClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClusterClient").finish_non_exhaustive()
    }
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

/// JSON merge patch (RFC 7386): absent keys are kept, null removes,
/// anything else replaces. Arrays are replaced whole.
fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    let serde_json::Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = serde_json::Value::Object(Default::default());
    }
    if let serde_json::Value::Object(existing) = target {
        for (k, v) in fields {
            if v.is_null() {
                existing.remove(k);
            } else {
                merge_patch(existing.entry(k.clone()).or_insert(serde_json::Value::Null), v);
            }
        }
    }
}

impl MockClusterClient {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self) -> String {
        let mut v = self.next_version.lock().unwrap();
        *v += 1;
        v.to_string()
    }

    fn record(&self, op: &str, kind: &str, namespace: &str, name: &str) {
        self.writes
            .lock()
            .unwrap()
            .push(format!("{} {} {}/{}", op, kind, namespace, name));
    }

    fn create_in<T: Resource + Clone>(
        &self,
        store: &Store<T>,
        kind: &str,
        namespace: &str,
        obj: &T,
    ) -> Result<T, ClusterError> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut map = store.lock().unwrap();
        if map.contains_key(&key(namespace, &name)) {
            return Err(ClusterError::Conflict(format!("{} {}/{} already exists", kind, namespace, name)));
        }
        let mut stored = obj.clone();
        stored.meta_mut().namespace = Some(namespace.to_string());
        stored.meta_mut().resource_version = Some(self.bump_version());
        map.insert(key(namespace, &name), stored.clone());
        drop(map);
        self.record("create", kind, namespace, &name);
        Ok(stored)
    }

    fn replace_in<T: Resource + Clone>(
        &self,
        store: &Store<T>,
        kind: &str,
        namespace: &str,
        obj: &T,
    ) -> Result<T, ClusterError> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut map = store.lock().unwrap();
        let current = map
            .get(&key(namespace, &name))
            .ok_or_else(|| ClusterError::NotFound(format!("{} {}/{}", kind, namespace, name)))?;
        if obj.meta().resource_version.is_some() && obj.meta().resource_version != current.meta().resource_version {
            return Err(ClusterError::Conflict(format!("{} {}/{} was modified", kind, namespace, name)));
        }
        let mut stored = obj.clone();
        stored.meta_mut().namespace = Some(namespace.to_string());
        stored.meta_mut().resource_version = Some(self.bump_version());
        map.insert(key(namespace, &name), stored.clone());
        drop(map);
        self.record("replace", kind, namespace, &name);
        Ok(stored)
    }

    /// Add a distribution to the mock store (for test setup)
    pub fn add_distribution(&self, distribution: LlamaStackDistribution) {
        let mut distribution = distribution;
        let namespace = distribution.meta().namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = distribution.meta().name.clone().unwrap_or_default();
        distribution.meta_mut().resource_version = Some(self.bump_version());
        self.distributions.lock().unwrap().insert(key(&namespace, &name), distribution);
    }

    /// Current stored distribution
    pub fn distribution(&self, namespace: &str, name: &str) -> Option<LlamaStackDistribution> {
        self.distributions.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Add a PVC to the mock store (for test setup)
    pub fn add_pvc(&self, namespace: &str, pvc: PersistentVolumeClaim) {
        let name = pvc.metadata.name.clone().unwrap_or_default();
        self.pvcs.lock().unwrap().insert(key(namespace, &name), pvc);
    }

    pub fn pvc(&self, namespace: &str, name: &str) -> Option<PersistentVolumeClaim> {
        self.pvcs.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Set the observed phase of a stored PVC ("Bound", "Pending", ...)
    pub fn set_pvc_phase(&self, namespace: &str, name: &str, phase: &str) {
        if let Some(pvc) = self.pvcs.lock().unwrap().get_mut(&key(namespace, name)) {
            pvc.status = Some(PersistentVolumeClaimStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            });
        }
    }

    /// Add a Deployment to the mock store (for test setup)
    pub fn add_deployment(&self, namespace: &str, deployment: Deployment) {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.deployments.lock().unwrap().insert(key(namespace, &name), deployment);
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.deployments.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Simulate the Deployment controller reporting ready replicas
    pub fn set_deployment_ready_replicas(&self, namespace: &str, name: &str, ready: i32) {
        if let Some(deployment) = self.deployments.lock().unwrap().get_mut(&key(namespace, name)) {
            deployment.status = Some(DeploymentStatus {
                ready_replicas: Some(ready),
                ..Default::default()
            });
        }
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Add a NetworkPolicy to the mock store (for test setup)
    pub fn add_network_policy(&self, namespace: &str, policy: NetworkPolicy) {
        let name = policy.metadata.name.clone().unwrap_or_default();
        self.network_policies.lock().unwrap().insert(key(namespace, &name), policy);
    }

    pub fn network_policy(&self, namespace: &str, name: &str) -> Option<NetworkPolicy> {
        self.network_policies.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Add a ConfigMap to the mock store (for test setup)
    pub fn add_config_map(&self, namespace: &str, config_map: ConfigMap) {
        let name = config_map.metadata.name.clone().unwrap_or_default();
        self.config_maps.lock().unwrap().insert(key(namespace, &name), config_map);
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.config_maps.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// All writes recorded so far
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Writes that touched anything other than distribution status
    pub fn child_writes(&self) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|w| !w.starts_with("status "))
            .collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Make status updates fail with an API error
    pub fn fail_status_updates(&self, message: Option<&str>) {
        *self.status_update_error.lock().unwrap() = message.map(str::to_string);
    }

    /// Make Deployment reads fail with an API error
    pub fn fail_deployment_reads(&self, message: Option<&str>) {
        *self.deployment_read_error.lock().unwrap() = message.map(str::to_string);
    }
}

#[async_trait::async_trait]
impl ClusterClient for MockClusterClient {
    async fn get_distribution(&self, namespace: &str, name: &str) -> Result<Option<LlamaStackDistribution>, ClusterError> {
        Ok(self.distribution(namespace, name))
    }

    async fn update_distribution_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        status: &LlamaStackDistributionStatus,
    ) -> Result<(), ClusterError> {
        if let Some(message) = self.status_update_error.lock().unwrap().clone() {
            return Err(ClusterError::Api(message));
        }
        let mut map = self.distributions.lock().unwrap();
        let current = map
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::NotFound(format!("LlamaStackDistribution {}/{}", namespace, name)))?;
        if resource_version.is_some() && resource_version != current.metadata.resource_version.as_deref() {
            return Err(ClusterError::Conflict(format!(
                "LlamaStackDistribution {}/{} was modified",
                namespace, name
            )));
        }
        // Applied the way the API server applies a merge patch on the
        // status subresource
        let patch = status_patch(status, resource_version)?;
        let mut stored = serde_json::to_value(&current.status)?;
        merge_patch(&mut stored, &patch["status"]);
        current.status = serde_json::from_value(stored)?;
        current.metadata.resource_version = Some(self.bump_version());
        drop(map);
        self.record("status", "LlamaStackDistribution", namespace, name);
        Ok(())
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, ClusterError> {
        Ok(self.pvc(namespace, name))
    }

    async fn create_pvc(&self, namespace: &str, pvc: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim, ClusterError> {
        self.create_in(&self.pvcs, "PersistentVolumeClaim", namespace, pvc)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        if let Some(message) = self.deployment_read_error.lock().unwrap().clone() {
            return Err(ClusterError::Api(message));
        }
        Ok(self.deployment(namespace, name))
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        self.create_in(&self.deployments, "Deployment", namespace, deployment)
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        self.replace_in(&self.deployments, "Deployment", namespace, deployment)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError> {
        Ok(self.service(namespace, name))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        self.create_in(&self.services, "Service", namespace, service)
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        self.replace_in(&self.services, "Service", namespace, service)
    }

    async fn get_network_policy(&self, namespace: &str, name: &str) -> Result<Option<NetworkPolicy>, ClusterError> {
        Ok(self.network_policy(namespace, name))
    }

    async fn create_network_policy(&self, namespace: &str, policy: &NetworkPolicy) -> Result<NetworkPolicy, ClusterError> {
        self.create_in(&self.network_policies, "NetworkPolicy", namespace, policy)
    }

    async fn replace_network_policy(&self, namespace: &str, policy: &NetworkPolicy) -> Result<NetworkPolicy, ClusterError> {
        self.replace_in(&self.network_policies, "NetworkPolicy", namespace, policy)
    }

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        let removed = self.network_policies.lock().unwrap().remove(&key(namespace, name));
        if removed.is_some() {
            self.record("delete", "NetworkPolicy", namespace, name);
        }
        Ok(removed.is_some())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, ClusterError> {
        Ok(self.config_map(namespace, name))
    }

    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap) -> Result<ConfigMap, ClusterError> {
        self.create_in(&self.config_maps, "ConfigMap", namespace, config_map)
    }
}
