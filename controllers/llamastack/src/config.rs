//! Operator configuration.
//!
//! Everything here is read once at startup and handed to the reconciler;
//! nothing re-reads the environment during a reconciliation pass.

use crate::error::ControllerError;
use crds::{DistributionRef, DistributionType};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{debug, info};

/// Name of the operator ConfigMap holding the feature flags
pub const OPERATOR_CONFIG_NAME: &str = "llama-stack-operator-config";
/// Namespace file mounted into every pod with a service account
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";
/// Default listen address for /metrics, /healthz and /readyz
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

const EMBEDDED_DISTRIBUTIONS: &str = include_str!("../distributions.json");

/// Cluster-wide facts the reconciler needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    /// Namespace the operator runs in
    pub operator_namespace: String,
    /// Known distributions (name -> image)
    pub distribution_images: BTreeMap<String, String>,
}

impl ClusterInfo {
    pub fn new(operator_namespace: impl Into<String>, distribution_images: BTreeMap<String, String>) -> Self {
        Self {
            operator_namespace: operator_namespace.into(),
            distribution_images,
        }
    }

    /// Parses a JSON object of `name -> image`.
    pub fn parse_distributions(json: &str) -> Result<BTreeMap<String, String>, ControllerError> {
        serde_json::from_str(json)
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid distribution map: {}", e)))
    }

    /// Resolves the container image for a distribution reference.
    ///
    /// Explicit images pass through; names are looked up in the image map.
    pub fn resolve_image(&self, distribution: &DistributionType) -> Result<String, ControllerError> {
        match distribution.validate()? {
            DistributionRef::Image(image) => Ok(image.to_string()),
            DistributionRef::Named(name) => self
                .distribution_images
                .get(name)
                .cloned()
                .ok_or_else(|| ControllerError::DistributionNotFound(name.to_string())),
        }
    }
}

/// Process-wide operator configuration
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub cluster_info: ClusterInfo,
    /// Restrict the controller to one namespace (all namespaces when unset)
    pub watch_namespace: Option<String>,
    /// Reported in status as the operator version
    pub operator_version: Option<String>,
    /// Reported in status as the server version once the Deployment is ready
    pub llama_stack_version: Option<String>,
    pub metrics_addr: SocketAddr,
}

impl OperatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok(), Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE))
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, namespace_file: &Path) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let operator_namespace = match non_empty("OPERATOR_NAMESPACE") {
            Some(ns) => ns,
            None => {
                debug!("OPERATOR_NAMESPACE not set, reading {}", namespace_file.display());
                let ns = std::fs::read_to_string(namespace_file).map_err(|e| {
                    ControllerError::InvalidConfig(format!(
                        "OPERATOR_NAMESPACE is not set and {} is unreadable: {}",
                        namespace_file.display(),
                        e
                    ))
                })?;
                let ns = ns.trim().to_string();
                if ns.is_empty() {
                    return Err(ControllerError::InvalidConfig(format!(
                        "{} is empty",
                        namespace_file.display()
                    )));
                }
                ns
            }
        };

        let distribution_images = match non_empty("DISTRIBUTIONS_FILE") {
            Some(path) => {
                info!("Loading distribution images from {}", path);
                let json = std::fs::read_to_string(&path)
                    .map_err(|e| ControllerError::InvalidConfig(format!("failed to read {}: {}", path, e)))?;
                ClusterInfo::parse_distributions(&json)?
            }
            None => ClusterInfo::parse_distributions(EMBEDDED_DISTRIBUTIONS)?,
        };

        let metrics_addr = non_empty("METRICS_ADDR")
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_addr
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid METRICS_ADDR {}: {}", metrics_addr, e)))?;

        Ok(Self {
            cluster_info: ClusterInfo::new(operator_namespace, distribution_images),
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            operator_version: non_empty("OPERATOR_VERSION"),
            llama_stack_version: non_empty("LLAMA_STACK_VERSION"),
            metrics_addr,
        })
    }
}
