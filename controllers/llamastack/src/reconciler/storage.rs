//! PersistentVolumeClaim for the server's data directory

use super::Reconciler;
use crate::deploy::{self, Applied};
use crate::error::ControllerError;
use crds::{LlamaStackDistribution, StorageSpec};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

/// Builds the claim for `storage`. Size falls back to the default.
pub fn build_pvc(instance: &LlamaStackDistribution, storage: &StorageSpec) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(instance.pvc_name()),
            namespace: Some(instance.namespace_or_default()),
            labels: Some(instance.selector_labels()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage.size_or_default().to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl Reconciler {
    pub(crate) async fn reconcile_pvc(
        &self,
        instance: &LlamaStackDistribution,
        storage: &StorageSpec,
        owner: &OwnerReference,
    ) -> Result<Applied, ControllerError> {
        let namespace = instance.namespace_or_default();
        deploy::apply_pvc(self.cluster.as_ref(), &namespace, owner, build_pvc(instance, storage)).await
    }
}
