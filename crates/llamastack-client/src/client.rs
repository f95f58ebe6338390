//! LlamaStack server client
//!
//! Bounded-timeout GETs against the server's `/v1/health` and
//! `/v1/providers` endpoints.

use crate::error::LlamaStackError;
use crate::models::{ProvidersResponse, ServerEndpoint, HEALTH_PATH, PROVIDERS_PATH};
use crate::probe_trait::ServerProbe;
use crds::ProviderInfo;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// LlamaStack HTTP client
#[derive(Debug, Clone)]
pub struct LlamaStackClient {
    client: Client,
}

impl LlamaStackClient {
    /// Create a client with the default 5s timeout
    pub fn new() -> Result<Self, LlamaStackError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, LlamaStackError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ServerProbe for LlamaStackClient {
    async fn check_health(&self, endpoint: &ServerEndpoint) -> Result<bool, LlamaStackError> {
        let url = endpoint.url(HEALTH_PATH);
        debug!("Checking server health at {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        debug!("Health endpoint {} returned {}", url, status);

        Ok(status == reqwest::StatusCode::OK)
    }

    async fn list_providers(&self, endpoint: &ServerEndpoint) -> Result<Vec<ProviderInfo>, LlamaStackError> {
        let url = endpoint.url(PROVIDERS_PATH);
        debug!("Listing providers at {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(LlamaStackError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: ProvidersResponse = serde_json::from_str(&body)?;
        debug!("Server at {} reported {} providers", endpoint, parsed.data.len());
        Ok(parsed.data)
    }
}
