//! LlamaStackDistribution CRD
//!
//! Declares a Llama Stack inference server deployment. The controller turns
//! this into a Deployment, an optional Service, an optional
//! PersistentVolumeClaim and an optional NetworkPolicy.

use crate::status::LlamaStackDistributionStatus;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Label key shared by the pod template, the selector and the Service
pub const DEFAULT_LABEL_KEY: &str = "app";
/// Label value paired with [`DEFAULT_LABEL_KEY`]
pub const DEFAULT_LABEL_VALUE: &str = "llama-stack";
/// Instance identity label
pub const INSTANCE_LABEL_KEY: &str = "app.kubernetes.io/instance";
/// Label carried by peer workloads allowed through the network policy
pub const PART_OF_LABEL_KEY: &str = "app.kubernetes.io/part-of";
/// Default container name (also the `part-of` value peers identify with)
pub const DEFAULT_CONTAINER_NAME: &str = "llama-stack";
/// Port used when the spec declares none
pub const DEFAULT_SERVER_PORT: i32 = 8321;
/// Name of the single Service port
pub const DEFAULT_SERVICE_PORT_NAME: &str = "http";
/// Storage requested when `storage.size` is unset
pub const DEFAULT_STORAGE_SIZE: &str = "10Gi";
/// Mount path of the storage volume when `storage.mountPath` is unset
pub const DEFAULT_MOUNT_PATH: &str = "/.llama";
/// Reported as the active distribution when an explicit image is used
pub const CUSTOM_DISTRIBUTION: &str = "custom";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "llamastack.io",
    version = "v1alpha1",
    kind = "LlamaStackDistribution",
    shortname = "llsd",
    namespaced,
    status = "LlamaStackDistributionStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LlamaStackDistributionSpec {
    /// Desired number of server replicas
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Server configuration
    pub server: ServerSpec,
}

fn default_replicas() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Which server image to run
    pub distribution: DistributionType,

    /// Container settings
    #[serde(default)]
    pub container_spec: ContainerSpec,

    /// Pod-level overrides applied after the computed defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_overrides: Option<PodOverrides>,

    /// Persistent storage for the server (emptyDir when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
}

/// Distribution selection: exactly one of `name` or `image`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DistributionType {
    /// Named distribution resolved through the operator's image map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Explicit container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Container name (defaults to "llama-stack")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ports served by the container; the first one is exposed by the Service
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<i32>,

    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVarSpec>,

    /// Entrypoint override
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// Arguments override
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Compute resources as quantity strings (e.g. "500m", "2Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodOverrides {
    /// Service account the server pods run as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Requested size (defaults to 10Gi). Ignored once the claim exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Where the volume is mounted (defaults to /.llama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

/// A validated distribution reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionRef<'a> {
    /// Look the image up by distribution name
    Named(&'a str),
    /// Use this image as-is
    Image(&'a str),
}

/// Distribution validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DistributionError {
    #[error("only one of distribution.name or distribution.image can be set")]
    Ambiguous,

    #[error("either distribution.name or distribution.image must be set")]
    Missing,
}

impl DistributionType {
    /// Validates that exactly one of `name` / `image` is set.
    ///
    /// Empty strings count as unset.
    pub fn validate(&self) -> Result<DistributionRef<'_>, DistributionError> {
        let name = self.name.as_deref().filter(|n| !n.is_empty());
        let image = self.image.as_deref().filter(|i| !i.is_empty());
        match (name, image) {
            (Some(_), Some(_)) => Err(DistributionError::Ambiguous),
            (Some(name), None) => Ok(DistributionRef::Named(name)),
            (None, Some(image)) => Ok(DistributionRef::Image(image)),
            (None, None) => Err(DistributionError::Missing),
        }
    }
}

impl StorageSpec {
    pub fn size_or_default(&self) -> &str {
        self.size.as_deref().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_STORAGE_SIZE)
    }

    pub fn mount_path_or_default(&self) -> &str {
        self.mount_path.as_deref().filter(|p| !p.is_empty()).unwrap_or(DEFAULT_MOUNT_PATH)
    }
}

impl LlamaStackDistribution {
    /// Whether the spec declares any port (and therefore gets a Service)
    pub fn has_ports(&self) -> bool {
        !self.spec.server.container_spec.ports.is_empty()
    }

    /// Port the server is addressed on: first declared port, else 8321
    pub fn service_port(&self) -> i32 {
        self.spec
            .server
            .container_spec
            .ports
            .first()
            .copied()
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn container_name(&self) -> &str {
        self.spec
            .server
            .container_spec
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CONTAINER_NAME)
    }

    pub fn service_name(&self) -> String {
        format!("{}-service", self.name_any())
    }

    pub fn pvc_name(&self) -> String {
        format!("{}-pvc", self.name_any())
    }

    pub fn network_policy_name(&self) -> String {
        format!("{}-network-policy", self.name_any())
    }

    /// Namespace of the resource ("default" when unset)
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }

    /// Labels used for the pod template, the Deployment selector, the
    /// Service selector and the NetworkPolicy pod selector.
    ///
    /// These must stay identical everywhere or the Deployment can no longer
    /// find its own pods.
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (DEFAULT_LABEL_KEY.to_string(), DEFAULT_LABEL_VALUE.to_string()),
            (INSTANCE_LABEL_KEY.to_string(), self.name_any()),
        ])
    }

    /// Distribution name reported in status ("custom" for explicit images)
    pub fn active_distribution(&self) -> Option<String> {
        match self.spec.server.distribution.validate() {
            Ok(DistributionRef::Named(name)) => Some(name.to_string()),
            Ok(DistributionRef::Image(_)) => Some(CUSTOM_DISTRIBUTION.to_string()),
            Err(_) => None,
        }
    }
}
