//! ClusterIP Service in front of the server pods

use super::Reconciler;
use crate::deploy::{self, Applied};
use crate::error::ControllerError;
use crds::{LlamaStackDistribution, DEFAULT_SERVICE_PORT_NAME};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub fn build_service(instance: &LlamaStackDistribution) -> Service {
    let port = instance.service_port();
    Service {
        metadata: ObjectMeta {
            name: Some(instance.service_name()),
            namespace: Some(instance.namespace_or_default()),
            labels: Some(instance.selector_labels()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(instance.selector_labels()),
            ports: Some(vec![ServicePort {
                name: Some(DEFAULT_SERVICE_PORT_NAME.to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl Reconciler {
    pub(crate) async fn reconcile_service(
        &self,
        instance: &LlamaStackDistribution,
        owner: &OwnerReference,
    ) -> Result<Applied, ControllerError> {
        let namespace = instance.namespace_or_default();
        deploy::apply_service(self.cluster.as_ref(), &namespace, owner, build_service(instance)).await
    }
}
