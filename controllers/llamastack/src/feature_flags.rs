//! Feature flag loading.
//!
//! Flags live in the operator ConfigMap. When the ConfigMap is missing it
//! is created with defaults so operators have something to edit.

use crate::config::OPERATOR_CONFIG_NAME;
use crate::error::ControllerError;
use cluster_client::ClusterClient;
use crds::{FeatureFlags, FEATURE_FLAGS_KEY};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Builds the default operator ConfigMap
pub fn default_config_map(namespace: &str) -> Result<ConfigMap, ControllerError> {
    let yaml = FeatureFlags::default()
        .to_yaml()
        .map_err(|e| ControllerError::FeatureFlags(e.to_string()))?;
    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(OPERATOR_CONFIG_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(FEATURE_FLAGS_KEY.to_string(), yaml)])),
        ..Default::default()
    })
}

/// Parses the flag set out of ConfigMap data. A missing key means defaults.
pub fn parse_feature_flags(data: Option<&BTreeMap<String, String>>) -> Result<FeatureFlags, ControllerError> {
    match data.and_then(|d| d.get(FEATURE_FLAGS_KEY)) {
        Some(yaml) => FeatureFlags::from_yaml(yaml).map_err(|e| ControllerError::FeatureFlags(e.to_string())),
        None => Ok(FeatureFlags::default()),
    }
}

/// Loads the feature flags from the operator namespace, creating the
/// ConfigMap with defaults when it does not exist.
pub async fn load_feature_flags(
    cluster: &dyn ClusterClient,
    operator_namespace: &str,
) -> Result<FeatureFlags, ControllerError> {
    let existing = cluster
        .get_config_map(operator_namespace, OPERATOR_CONFIG_NAME)
        .await
        .map_err(|e| ControllerError::cluster("get", "ConfigMap", e))?;

    let flags = match existing {
        Some(config_map) => parse_feature_flags(config_map.data.as_ref())?,
        None => {
            info!(
                "ConfigMap {}/{} not found, creating it with default feature flags",
                operator_namespace, OPERATOR_CONFIG_NAME
            );
            let config_map = default_config_map(operator_namespace)?;
            match cluster.create_config_map(operator_namespace, &config_map).await {
                Ok(_) => {}
                // Another replica won the race; its content is the default too
                Err(e) if e.is_conflict() => {
                    warn!("ConfigMap {} was created concurrently", OPERATOR_CONFIG_NAME);
                }
                Err(e) => return Err(ControllerError::cluster("create", "ConfigMap", e)),
            }
            FeatureFlags::default()
        }
    };

    info!("Feature flags: enableNetworkPolicy={}", flags.enable_network_policy.enabled);
    Ok(flags)
}
