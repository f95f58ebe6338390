//! Wire types for the LlamaStack server API

use crds::ProviderInfo;
use serde::{Deserialize, Serialize};

/// Health probe path
pub const HEALTH_PATH: &str = "/v1/health";
/// Provider listing path
pub const PROVIDERS_PATH: &str = "/v1/providers";
/// DNS suffix for in-cluster service addresses
pub const CLUSTER_DOMAIN: &str = "svc.cluster.local";

/// Envelope returned by `GET /v1/providers`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersResponse {
    pub data: Vec<ProviderInfo>,
}

/// Address of a running server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    base_url: String,
}

impl ServerEndpoint {
    /// Endpoint from an explicit base URL (trailing slashes are dropped)
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `http://<service>.<namespace>.svc.cluster.local:<port>`
    pub fn in_cluster(service: &str, namespace: &str, port: i32) -> Self {
        Self::new(format!("http://{}.{}.{}:{}", service, namespace, CLUSTER_DOMAIN, port))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_cluster_address() {
        let endpoint = ServerEndpoint::in_cluster("demo-service", "ai", 8321);
        assert_eq!(endpoint.base_url(), "http://demo-service.ai.svc.cluster.local:8321");
        assert_eq!(endpoint.url(HEALTH_PATH), "http://demo-service.ai.svc.cluster.local:8321/v1/health");
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        assert_eq!(ServerEndpoint::new("http://127.0.0.1:1/").url(PROVIDERS_PATH), "http://127.0.0.1:1/v1/providers");
    }

    #[test]
    fn test_providers_envelope() {
        let body = r#"{"data":[{"api":"inference","provider_id":"ollama","provider_type":"remote::ollama"}]}"#;
        let parsed: ProvidersResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].api, "inference");
    }
}
