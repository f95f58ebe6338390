//! LlamaStackDistribution status
//!
//! Status is owned by the controller and recomputed on every
//! reconciliation pass.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition type for the server Deployment
pub const CONDITION_DEPLOYMENT_READY: &str = "DeploymentReady";
/// Condition type for the PersistentVolumeClaim
pub const CONDITION_STORAGE_READY: &str = "StorageReady";
/// Condition type for the Service
pub const CONDITION_SERVICE_READY: &str = "ServiceReady";
/// Condition type for the server health probe
pub const CONDITION_HEALTH_CHECK: &str = "HealthCheck";

pub const MESSAGE_DEPLOYMENT_PENDING: &str = "Deployment is pending";
pub const MESSAGE_DEPLOYMENT_READY: &str = "Deployment is ready";
pub const MESSAGE_STORAGE_READY: &str = "Storage is ready";
pub const MESSAGE_SERVICE_READY: &str = "Service is ready";
pub const MESSAGE_HEALTH_CHECK_PASSED: &str = "Health check passed";
pub const MESSAGE_HEALTH_CHECK_FAILED: &str = "Health check failed";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LlamaStackDistributionStatus {
    /// Coarse-grained state of the distribution
    #[serde(default)]
    pub phase: DistributionPhase,

    /// One condition per monitored aspect
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Ready replicas last observed on the Deployment
    #[serde(default)]
    pub available_replicas: i32,

    /// Distribution summary
    #[serde(default)]
    pub distribution_config: DistributionConfig,

    /// Version metadata
    #[serde(default)]
    pub version: VersionInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Distribution phase
///
/// Serializes as PascalCase ("Ready", "Failed", etc.) but also accepts
/// lowercase values.
#[serde(rename_all = "PascalCase")]
pub enum DistributionPhase {
    /// Deployment not created yet
    #[default]
    #[serde(alias = "pending")]
    Pending,

    /// Deployment exists but the server is not serving yet
    #[serde(alias = "initializing")]
    Initializing,

    /// All replicas ready and the health probe passed
    #[serde(alias = "ready")]
    Ready,

    /// Reconciliation failed or the server reported unhealthy
    #[serde(alias = "failed")]
    Failed,
}

impl DistributionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionPhase::Pending => "Pending",
            DistributionPhase::Initializing => "Initializing",
            DistributionPhase::Ready => "Ready",
            DistributionPhase::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for DistributionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents one observed aspect of the distribution
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (DeploymentReady, StorageReady, ...)
    pub r#type: String,
    /// "True" or "False"
    pub status: String,
    /// Machine-readable reason
    pub reason: String,
    /// Human-readable message
    pub message: String,
    /// Last time the status flipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionConfig {
    /// Distribution in use ("custom" for explicit images)
    #[serde(default)]
    pub active_distribution: Option<String>,

    /// Distributions this operator can resolve (name -> image)
    #[serde(default)]
    pub available_distributions: BTreeMap<String, String>,

    /// Providers reported by the running server
    #[serde(default)]
    pub providers: Vec<ProviderInfo>,
}

/// A provider as reported by the server's `/v1/providers` endpoint
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    #[serde(default)]
    pub api: String,
    #[serde(default, alias = "provider_id")]
    pub provider_id: String,
    #[serde(default, alias = "provider_type")]
    pub provider_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<ProviderHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub operator_version: Option<String>,
    #[serde(default)]
    pub llama_stack_server_version: Option<String>,
    #[serde(default)]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl LlamaStackDistributionStatus {
    /// Sets (or replaces) the condition of the given type.
    ///
    /// `last_transition_time` only moves when the True/False status flips.
    pub fn set_condition(&mut self, condition_type: &str, ready: bool, reason: &str, message: impl Into<String>) {
        let status = if ready { "True" } else { "False" };
        let message = message.into();
        let now = chrono::Utc::now();

        if let Some(existing) = self.conditions.iter_mut().find(|c| c.r#type == condition_type) {
            if existing.status != status {
                existing.last_transition_time = Some(now);
            }
            existing.status = status.to_string();
            existing.reason = reason.to_string();
            existing.message = message;
            return;
        }

        self.conditions.push(Condition {
            r#type: condition_type.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message,
            last_transition_time: Some(now),
        });
    }

    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    pub fn set_deployment_ready(&mut self, ready: bool, message: impl Into<String>) {
        let reason = if ready { "DeploymentReady" } else { "DeploymentNotReady" };
        self.set_condition(CONDITION_DEPLOYMENT_READY, ready, reason, message);
    }

    pub fn set_storage_ready(&mut self, ready: bool, message: impl Into<String>) {
        let reason = if ready { "StorageReady" } else { "StorageNotReady" };
        self.set_condition(CONDITION_STORAGE_READY, ready, reason, message);
    }

    pub fn set_service_ready(&mut self, ready: bool, message: impl Into<String>) {
        let reason = if ready { "ServiceReady" } else { "ServiceNotReady" };
        self.set_condition(CONDITION_SERVICE_READY, ready, reason, message);
    }

    pub fn set_health_check(&mut self, healthy: bool, message: impl Into<String>) {
        let reason = if healthy { "HealthCheckPassed" } else { "HealthCheckFailed" };
        self.set_condition(CONDITION_HEALTH_CHECK, healthy, reason, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_appends_then_replaces() {
        let mut status = LlamaStackDistributionStatus::default();
        status.set_deployment_ready(false, MESSAGE_DEPLOYMENT_PENDING);
        status.set_deployment_ready(true, MESSAGE_DEPLOYMENT_READY);

        assert_eq!(status.conditions.len(), 1);
        let c = status.condition(CONDITION_DEPLOYMENT_READY).unwrap();
        assert!(c.is_true());
        assert_eq!(c.message, MESSAGE_DEPLOYMENT_READY);
        assert_eq!(c.reason, "DeploymentReady");
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut status = LlamaStackDistributionStatus::default();
        status.set_health_check(false, "first");
        let first = status.condition(CONDITION_HEALTH_CHECK).unwrap().last_transition_time;
        status.set_health_check(false, "second");
        let second = status.condition(CONDITION_HEALTH_CHECK).unwrap();
        assert_eq!(second.last_transition_time, first);
        assert_eq!(second.message, "second");
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(serde_json::to_value(DistributionPhase::Initializing).unwrap(), "Initializing");
        let p: DistributionPhase = serde_json::from_value(serde_json::json!("ready")).unwrap();
        assert_eq!(p, DistributionPhase::Ready);
    }

    #[test]
    fn test_cleared_fields_serialize_explicitly() {
        // Status is written as a merge patch; an omitted key would keep the
        // stored value.
        let value = serde_json::to_value(LlamaStackDistributionStatus::default()).unwrap();
        assert_eq!(value["conditions"], serde_json::json!([]));
        assert_eq!(value["distributionConfig"]["providers"], serde_json::json!([]));
        assert_eq!(value["distributionConfig"]["availableDistributions"], serde_json::json!({}));
        assert!(value["distributionConfig"]["activeDistribution"].is_null());
        assert!(value["distributionConfig"].as_object().unwrap().contains_key("activeDistribution"));
        assert!(value["version"].as_object().unwrap().contains_key("llamaStackServerVersion"));
    }

    #[test]
    fn test_provider_info_accepts_snake_case() {
        let p: ProviderInfo = serde_json::from_value(serde_json::json!({
            "api": "inference",
            "provider_id": "ollama",
            "provider_type": "remote::ollama",
            "config": {"url": "http://ollama:11434"},
            "health": {"status": "OK"}
        }))
        .unwrap();
        assert_eq!(p.provider_id, "ollama");
        assert_eq!(p.provider_type, "remote::ollama");
        assert_eq!(p.health.unwrap().status, "OK");
    }
}
