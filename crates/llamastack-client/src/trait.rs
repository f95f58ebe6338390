//! ServerProbe trait for mocking
//!
//! This trait abstracts the two HTTP calls the operator makes against a
//! running server so the status evaluator can be tested without a network.

use crate::error::LlamaStackError;
use crate::models::ServerEndpoint;
use crds::ProviderInfo;

/// Trait for LlamaStack server probes
#[async_trait::async_trait]
pub trait ServerProbe: Send + Sync {
    /// `Ok(true)` iff the health endpoint answered 200, `Ok(false)` for any
    /// other status, `Err` when no response was received.
    async fn check_health(&self, endpoint: &ServerEndpoint) -> Result<bool, LlamaStackError>;

    /// Providers reported by the server. Non-200 and malformed bodies are errors.
    async fn list_providers(&self, endpoint: &ServerEndpoint) -> Result<Vec<ProviderInfo>, LlamaStackError>;
}
