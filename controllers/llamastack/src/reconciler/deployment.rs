//! Server Deployment
//!
//! The pod template is fully derived from the distribution spec. The
//! selector and the pod labels come from the same helper so they can never
//! drift apart.

use super::Reconciler;
use crate::deploy::{self, Applied};
use crate::error::ControllerError;
use crds::{LlamaStackDistribution, DEFAULT_SERVER_PORT};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

/// Name of the data volume in the pod
pub const STORAGE_VOLUME_NAME: &str = "lls-storage";

fn quantities(values: &BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|(k, v)| (k.clone(), Quantity(v.clone()))).collect())
}

/// Builds the server container.
pub fn build_container(instance: &LlamaStackDistribution, image: &str) -> Container {
    let spec = &instance.spec.server.container_spec;
    let mount_path = instance
        .spec
        .server
        .storage
        .as_ref()
        .map(|s| s.mount_path_or_default().to_string())
        .unwrap_or_else(|| crds::DEFAULT_MOUNT_PATH.to_string());

    let ports = if spec.ports.is_empty() {
        vec![DEFAULT_SERVER_PORT]
    } else {
        spec.ports.clone()
    };

    Container {
        name: instance.container_name().to_string(),
        image: Some(image.to_string()),
        ports: Some(
            ports
                .into_iter()
                .map(|port| ContainerPort {
                    container_port: port,
                    ..Default::default()
                })
                .collect(),
        ),
        env: (!spec.env.is_empty()).then(|| {
            spec.env
                .iter()
                .map(|e| EnvVar {
                    name: e.name.clone(),
                    value: Some(e.value.clone()),
                    ..Default::default()
                })
                .collect()
        }),
        command: (!spec.command.is_empty()).then(|| spec.command.clone()),
        args: (!spec.args.is_empty()).then(|| spec.args.clone()),
        resources: spec.resources.as_ref().map(|r| ResourceRequirements {
            requests: quantities(&r.requests),
            limits: quantities(&r.limits),
            ..Default::default()
        }),
        volume_mounts: Some(vec![VolumeMount {
            name: STORAGE_VOLUME_NAME.to_string(),
            mount_path,
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Builds the pod template: PVC-backed volume when storage is requested,
/// emptyDir otherwise, then pod overrides on top.
pub fn build_pod_template(instance: &LlamaStackDistribution, image: &str) -> PodTemplateSpec {
    let volume = match &instance.spec.server.storage {
        Some(_) => Volume {
            name: STORAGE_VOLUME_NAME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: instance.pvc_name(),
                ..Default::default()
            }),
            ..Default::default()
        },
        None => Volume {
            name: STORAGE_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    };

    let mut pod_spec = PodSpec {
        containers: vec![build_container(instance, image)],
        volumes: Some(vec![volume]),
        ..Default::default()
    };

    if let Some(sa) = instance
        .spec
        .server
        .pod_overrides
        .as_ref()
        .and_then(|o| o.service_account_name.as_deref())
        .filter(|sa| !sa.is_empty())
    {
        pod_spec.service_account_name = Some(sa.to_string());
    }

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(instance.selector_labels()),
            ..Default::default()
        }),
        spec: Some(pod_spec),
    }
}

/// Builds the server Deployment for a resolved image.
pub fn build_deployment(instance: &LlamaStackDistribution, image: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(instance.metadata.name.clone().unwrap_or_default()),
            namespace: Some(instance.namespace_or_default()),
            labels: Some(instance.selector_labels()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(instance.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(instance.selector_labels()),
                ..Default::default()
            },
            template: build_pod_template(instance, image),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl Reconciler {
    pub(crate) async fn reconcile_deployment(
        &self,
        instance: &LlamaStackDistribution,
        image: &str,
        owner: &OwnerReference,
    ) -> Result<Applied, ControllerError> {
        let namespace = instance.namespace_or_default();
        deploy::apply_deployment(self.cluster.as_ref(), &namespace, owner, build_deployment(instance, image)).await
    }
}
