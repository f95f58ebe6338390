//! Idempotent apply helpers for child resources.
//!
//! Each helper reads the live object first and only writes when the live
//! object is missing or has drifted from the desired one. A desired spec
//! that is already contained in the live spec (the API server adds
//! defaults) counts as unchanged, so repeated passes over an unchanged
//! distribution perform no writes.
//!
//! Containment alone cannot see a field that was removed from the desired
//! object, so every write also records a hash of the desired labels and
//! spec in [`APPLIED_HASH_ANNOTATION`]. A different hash forces a replace.

use crate::error::ControllerError;
use cluster_client::ClusterClient;
use crds::LlamaStackDistribution;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Hash of the desired labels and spec last written to a child
pub const APPLIED_HASH_ANNOTATION: &str = "llamastack.io/applied-hash";

/// What an apply call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

/// Controller owner reference pointing at the distribution.
///
/// Children carry it so they are garbage collected with the distribution
/// and so change events on them requeue it.
pub fn owner_reference(instance: &LlamaStackDistribution) -> Result<OwnerReference, ControllerError> {
    instance.controller_owner_ref(&()).ok_or_else(|| ControllerError::Build {
        kind: "OwnerReference",
        message: "distribution has no name or uid".to_string(),
    })
}

/// Returns true when every field set in `desired` has the same value in
/// `live`. Arrays must match element for element.
pub fn is_derivative(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Null, _) => true,
        (Value::Object(d), Value::Object(l)) => d
            .iter()
            .all(|(key, value)| value.is_null() || l.get(key).is_some_and(|lv| is_derivative(value, lv))),
        (Value::Array(d), Value::Array(l)) => {
            d.len() == l.len() && d.iter().zip(l).all(|(dv, lv)| is_derivative(dv, lv))
        }
        (d, l) => d == l,
    }
}

fn to_value<T: Serialize>(kind: &'static str, value: &T) -> Result<Value, ControllerError> {
    serde_json::to_value(value).map_err(|e| ControllerError::Build {
        kind,
        message: e.to_string(),
    })
}

/// Fails when the live object is controlled by a different owner.
fn check_ownership(kind: &'static str, live: &ObjectMeta, owner: &OwnerReference) -> Result<(), ControllerError> {
    let foreign = live
        .owner_references
        .iter()
        .flatten()
        .any(|r| r.controller == Some(true) && r.uid != owner.uid);
    if foreign {
        return Err(ControllerError::OwnershipConflict {
            kind,
            name: live.name.clone().unwrap_or_default(),
        });
    }
    Ok(())
}

/// Hex SHA-256 of the desired labels and spec.
pub fn applied_hash<S: Serialize>(
    kind: &'static str,
    labels: Option<&BTreeMap<String, String>>,
    spec: &S,
) -> Result<String, ControllerError> {
    let bytes = serde_json::to_vec(&(labels, spec)).map_err(|e| ControllerError::Build {
        kind,
        message: e.to_string(),
    })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations.as_ref()?.get(key).map(String::as_str)
}

/// Stamps the owner reference and the applied hash on a desired object.
fn prepare<S: Serialize>(
    kind: &'static str,
    meta: &mut ObjectMeta,
    spec: &S,
    owner: &OwnerReference,
) -> Result<(), ControllerError> {
    let hash = applied_hash(kind, meta.labels.as_ref(), spec)?;
    meta.annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(APPLIED_HASH_ANNOTATION.to_string(), hash);
    with_owner(meta, owner);
    Ok(())
}

/// Whether the live object needs to be rewritten to match `desired`.
fn needs_update<S: Serialize>(
    kind: &'static str,
    desired_meta: &ObjectMeta,
    desired_spec: &S,
    live_meta: &ObjectMeta,
    live_spec: &S,
    owner: &OwnerReference,
) -> Result<bool, ControllerError> {
    let owned = live_meta
        .owner_references
        .iter()
        .flatten()
        .any(|r| r.uid == owner.uid);
    let labels_match = is_derivative(
        &to_value(kind, &desired_meta.labels)?,
        &to_value(kind, &live_meta.labels)?,
    );
    let spec_match = is_derivative(&to_value(kind, desired_spec)?, &to_value(kind, live_spec)?);
    let hash_match = annotation(desired_meta, APPLIED_HASH_ANNOTATION) == annotation(live_meta, APPLIED_HASH_ANNOTATION);
    Ok(!(owned && labels_match && spec_match && hash_match))
}

fn with_owner(meta: &mut ObjectMeta, owner: &OwnerReference) {
    meta.owner_references = Some(vec![owner.clone()]);
}

/// Creates the claim when absent. An existing claim is never modified.
pub async fn apply_pvc(
    cluster: &dyn ClusterClient,
    namespace: &str,
    owner: &OwnerReference,
    mut desired: PersistentVolumeClaim,
) -> Result<Applied, ControllerError> {
    let name = desired.metadata.name.clone().unwrap_or_default();
    let live = cluster
        .get_pvc(namespace, &name)
        .await
        .map_err(|e| ControllerError::cluster("get", "PersistentVolumeClaim", e))?;

    if live.is_some() {
        debug!("PersistentVolumeClaim {}/{} exists, leaving it untouched", namespace, name);
        return Ok(Applied::Unchanged);
    }

    with_owner(&mut desired.metadata, owner);
    info!("Creating PersistentVolumeClaim {}/{}", namespace, name);
    cluster
        .create_pvc(namespace, &desired)
        .await
        .map_err(|e| ControllerError::cluster("create", "PersistentVolumeClaim", e))?;
    Ok(Applied::Created)
}

/// Creates or updates the server Deployment.
pub async fn apply_deployment(
    cluster: &dyn ClusterClient,
    namespace: &str,
    owner: &OwnerReference,
    mut desired: Deployment,
) -> Result<Applied, ControllerError> {
    let name = desired.metadata.name.clone().unwrap_or_default();
    prepare("Deployment", &mut desired.metadata, &desired.spec, owner)?;

    let live = cluster
        .get_deployment(namespace, &name)
        .await
        .map_err(|e| ControllerError::cluster("get", "Deployment", e))?;

    let Some(live) = live else {
        info!("Creating Deployment {}/{}", namespace, name);
        cluster
            .create_deployment(namespace, &desired)
            .await
            .map_err(|e| ControllerError::cluster("create", "Deployment", e))?;
        return Ok(Applied::Created);
    };

    check_ownership("Deployment", &live.metadata, owner)?;
    if !needs_update("Deployment", &desired.metadata, &desired.spec, &live.metadata, &live.spec, owner)? {
        debug!("Deployment {}/{} is up to date", namespace, name);
        return Ok(Applied::Unchanged);
    }

    desired.metadata.resource_version = live.metadata.resource_version.clone();
    info!("Updating Deployment {}/{}", namespace, name);
    cluster
        .replace_deployment(namespace, &desired)
        .await
        .map_err(|e| ControllerError::cluster("update", "Deployment", e))?;
    Ok(Applied::Updated)
}

/// Creates or updates the Service.
pub async fn apply_service(
    cluster: &dyn ClusterClient,
    namespace: &str,
    owner: &OwnerReference,
    mut desired: Service,
) -> Result<Applied, ControllerError> {
    let name = desired.metadata.name.clone().unwrap_or_default();
    prepare("Service", &mut desired.metadata, &desired.spec, owner)?;

    let live = cluster
        .get_service(namespace, &name)
        .await
        .map_err(|e| ControllerError::cluster("get", "Service", e))?;

    let Some(live) = live else {
        info!("Creating Service {}/{}", namespace, name);
        cluster
            .create_service(namespace, &desired)
            .await
            .map_err(|e| ControllerError::cluster("create", "Service", e))?;
        return Ok(Applied::Created);
    };

    check_ownership("Service", &live.metadata, owner)?;
    if !needs_update("Service", &desired.metadata, &desired.spec, &live.metadata, &live.spec, owner)? {
        debug!("Service {}/{} is up to date", namespace, name);
        return Ok(Applied::Unchanged);
    }

    // clusterIP is immutable and allocated by the API server
    if let (Some(desired_spec), Some(live_spec)) = (desired.spec.as_mut(), live.spec.as_ref()) {
        desired_spec.cluster_ip = live_spec.cluster_ip.clone();
        desired_spec.cluster_ips = live_spec.cluster_ips.clone();
    }
    desired.metadata.resource_version = live.metadata.resource_version.clone();
    info!("Updating Service {}/{}", namespace, name);
    cluster
        .replace_service(namespace, &desired)
        .await
        .map_err(|e| ControllerError::cluster("update", "Service", e))?;
    Ok(Applied::Updated)
}

/// Creates or updates the NetworkPolicy.
pub async fn apply_network_policy(
    cluster: &dyn ClusterClient,
    namespace: &str,
    owner: &OwnerReference,
    mut desired: NetworkPolicy,
) -> Result<Applied, ControllerError> {
    let name = desired.metadata.name.clone().unwrap_or_default();
    prepare("NetworkPolicy", &mut desired.metadata, &desired.spec, owner)?;

    let live = cluster
        .get_network_policy(namespace, &name)
        .await
        .map_err(|e| ControllerError::cluster("get", "NetworkPolicy", e))?;

    let Some(live) = live else {
        info!("Creating NetworkPolicy {}/{}", namespace, name);
        cluster
            .create_network_policy(namespace, &desired)
            .await
            .map_err(|e| ControllerError::cluster("create", "NetworkPolicy", e))?;
        return Ok(Applied::Created);
    };

    check_ownership("NetworkPolicy", &live.metadata, owner)?;
    if !needs_update("NetworkPolicy", &desired.metadata, &desired.spec, &live.metadata, &live.spec, owner)? {
        debug!("NetworkPolicy {}/{} is up to date", namespace, name);
        return Ok(Applied::Unchanged);
    }

    desired.metadata.resource_version = live.metadata.resource_version.clone();
    info!("Updating NetworkPolicy {}/{}", namespace, name);
    cluster
        .replace_network_policy(namespace, &desired)
        .await
        .map_err(|e| ControllerError::cluster("update", "NetworkPolicy", e))?;
    Ok(Applied::Updated)
}

/// Deletes the NetworkPolicy if present. A missing policy is not an error.
pub async fn handle_disabled_network_policy(
    cluster: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<bool, ControllerError> {
    let deleted = cluster
        .delete_network_policy(namespace, name)
        .await
        .map_err(|e| ControllerError::cluster("delete", "NetworkPolicy", e))?;
    if deleted {
        info!("Deleted NetworkPolicy {}/{} (feature disabled)", namespace, name);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_derivative_ignores_server_defaults() {
        let desired = json!({"replicas": 1, "template": {"spec": {"containers": [{"name": "llama-stack"}]}}});
        let live = json!({
            "replicas": 1,
            "revisionHistoryLimit": 10,
            "template": {"spec": {"containers": [{"name": "llama-stack", "imagePullPolicy": "Always"}], "dnsPolicy": "ClusterFirst"}}
        });
        assert!(is_derivative(&desired, &live));
    }

    #[test]
    fn test_is_derivative_detects_changes() {
        assert!(!is_derivative(&json!({"replicas": 2}), &json!({"replicas": 1})));
        assert!(!is_derivative(&json!({"image": "a"}), &json!({})));
        // Removing a list element is a change
        assert!(!is_derivative(&json!({"ports": [1]}), &json!({"ports": [1, 2]})));
    }

    #[test]
    fn test_is_derivative_null_means_unset() {
        assert!(is_derivative(&json!({"serviceAccountName": null}), &json!({})));
        assert!(is_derivative(&Value::Null, &json!({"anything": true})));
    }

    #[test]
    fn test_applied_hash_changes_when_field_removed() {
        let labels = BTreeMap::from([("app".to_string(), "llama-stack".to_string())]);
        let with_sa = json!({"template": {"spec": {"serviceAccountName": "llama-sa"}}});
        let without_sa = json!({"template": {"spec": {}}});

        let a = applied_hash("Deployment", Some(&labels), &with_sa).unwrap();
        let b = applied_hash("Deployment", Some(&labels), &without_sa).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, applied_hash("Deployment", Some(&labels), &with_sa).unwrap());
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_check_ownership_rejects_foreign_controller() {
        let ours = OwnerReference {
            uid: "ours".to_string(),
            controller: Some(true),
            ..Default::default()
        };
        let meta = ObjectMeta {
            name: Some("demo".to_string()),
            owner_references: Some(vec![OwnerReference {
                uid: "theirs".to_string(),
                controller: Some(true),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert!(matches!(
            check_ownership("Deployment", &meta, &ours),
            Err(ControllerError::OwnershipConflict { kind: "Deployment", .. })
        ));
        assert!(check_ownership("Deployment", &ObjectMeta::default(), &ours).is_ok());
    }
}
