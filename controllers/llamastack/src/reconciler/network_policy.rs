//! Ingress NetworkPolicy, gated by the `enableNetworkPolicy` feature flag
//!
//! When enabled the server pods accept traffic on the service port from two
//! sources only: pods anywhere labelled `app.kubernetes.io/part-of:
//! llama-stack`, and any pod in the operator's namespace.

use super::Reconciler;
use crate::deploy::{self, Applied};
use crate::error::ControllerError;
use crds::{LlamaStackDistribution, DEFAULT_CONTAINER_NAME, PART_OF_LABEL_KEY};
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Label every namespace carries with its own name
pub const NAMESPACE_NAME_LABEL_KEY: &str = "kubernetes.io/metadata.name";

fn match_labels(key: &str, value: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
        ..Default::default()
    }
}

fn service_port(port: i32) -> Vec<NetworkPolicyPort> {
    vec![NetworkPolicyPort {
        protocol: Some("TCP".to_string()),
        port: Some(IntOrString::Int(port)),
        ..Default::default()
    }]
}

pub fn build_network_policy(instance: &LlamaStackDistribution, operator_namespace: &str) -> NetworkPolicy {
    let port = instance.service_port();

    // Peers across all namespaces that identify as part of the stack
    let peers_by_label = NetworkPolicyIngressRule {
        from: Some(vec![NetworkPolicyPeer {
            pod_selector: Some(match_labels(PART_OF_LABEL_KEY, DEFAULT_CONTAINER_NAME)),
            namespace_selector: Some(LabelSelector::default()),
            ..Default::default()
        }]),
        ports: Some(service_port(port)),
    };

    // Any pod in the operator namespace
    let operator_namespace_pods = NetworkPolicyIngressRule {
        from: Some(vec![NetworkPolicyPeer {
            pod_selector: Some(LabelSelector::default()),
            namespace_selector: Some(match_labels(NAMESPACE_NAME_LABEL_KEY, operator_namespace)),
            ..Default::default()
        }]),
        ports: Some(service_port(port)),
    };

    NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(instance.network_policy_name()),
            namespace: Some(instance.namespace_or_default()),
            labels: Some(instance.selector_labels()),
            ..Default::default()
        },
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector {
                match_labels: Some(instance.selector_labels()),
                ..Default::default()
            }
            .into(),
            policy_types: Some(vec!["Ingress".to_string()]),
            ingress: Some(vec![peers_by_label, operator_namespace_pods]),
            ..Default::default()
        }),
    }
}

impl Reconciler {
    /// Applies the policy when the flag is on, removes it when the flag is off.
    pub(crate) async fn reconcile_network_policy(
        &self,
        instance: &LlamaStackDistribution,
        owner: &OwnerReference,
    ) -> Result<Applied, ControllerError> {
        let namespace = instance.namespace_or_default();

        if !self.feature_flags.enable_network_policy.enabled {
            let deleted = deploy::handle_disabled_network_policy(
                self.cluster.as_ref(),
                &namespace,
                &instance.network_policy_name(),
            )
            .await?;
            return Ok(if deleted { Applied::Updated } else { Applied::Unchanged });
        }

        let policy = build_network_policy(instance, &self.config.cluster_info.operator_namespace);
        deploy::apply_network_policy(self.cluster.as_ref(), &namespace, owner, policy).await
    }
}
