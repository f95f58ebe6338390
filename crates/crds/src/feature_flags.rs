//! Operator feature flags
//!
//! Stored as a YAML document under the `featureFlags` key of the operator
//! ConfigMap.

use serde::{Deserialize, Serialize};

/// ConfigMap key holding the YAML-encoded flag set
pub const FEATURE_FLAGS_KEY: &str = "featureFlags";
/// Network policies are opt-in
pub const NETWORK_POLICY_DEFAULT_VALUE: bool = false;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default = "network_policy_default")]
    pub enable_network_policy: FeatureFlag,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FeatureFlag {
    #[serde(default)]
    pub enabled: bool,
}

fn network_policy_default() -> FeatureFlag {
    FeatureFlag {
        enabled: NETWORK_POLICY_DEFAULT_VALUE,
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_network_policy: network_policy_default(),
        }
    }
}

impl FeatureFlags {
    /// Parses the YAML flag document.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
