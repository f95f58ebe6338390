//! Mock ServerProbe for unit testing
//!
//! Returns canned answers and records every call so tests can assert that
//! a probe was (or was not) attempted.

use crate::error::LlamaStackError;
use crate::models::ServerEndpoint;
use crate::probe_trait::ServerProbe;
use crds::ProviderInfo;
use std::sync::{Arc, Mutex};

/// Canned health answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthAnswer {
    /// 200
    Healthy,
    /// Any other status code
    Unhealthy,
    /// No response
    Unreachable(String),
}

/// Mock ServerProbe for testing
#[derive(Debug, Clone)]
pub struct MockServerProbe {
    pub(crate) health: Arc<Mutex<HealthAnswer>>,
    pub(crate) providers: Arc<Mutex<Result<Vec<ProviderInfo>, String>>>,
    pub(crate) health_calls: Arc<Mutex<Vec<String>>>,
    pub(crate) provider_calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockServerProbe {
    fn default() -> Self {
        Self {
            health: Arc::new(Mutex::new(HealthAnswer::Healthy)),
            providers: Arc::new(Mutex::new(Ok(Vec::new()))),
            health_calls: Arc::new(Mutex::new(Vec::new())),
            provider_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockServerProbe {
    /// Healthy server with no providers
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_health(&self, answer: HealthAnswer) {
        *self.health.lock().unwrap() = answer;
    }

    pub fn set_providers(&self, providers: Vec<ProviderInfo>) {
        *self.providers.lock().unwrap() = Ok(providers);
    }

    /// Make provider listing fail with the given message
    pub fn fail_providers(&self, message: &str) {
        *self.providers.lock().unwrap() = Err(message.to_string());
    }

    /// URLs passed to `check_health`, in call order
    pub fn health_calls(&self) -> Vec<String> {
        self.health_calls.lock().unwrap().clone()
    }

    /// URLs passed to `list_providers`, in call order
    pub fn provider_calls(&self) -> Vec<String> {
        self.provider_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ServerProbe for MockServerProbe {
    async fn check_health(&self, endpoint: &ServerEndpoint) -> Result<bool, LlamaStackError> {
        self.health_calls.lock().unwrap().push(endpoint.base_url().to_string());
        match self.health.lock().unwrap().clone() {
            HealthAnswer::Healthy => Ok(true),
            HealthAnswer::Unhealthy => Ok(false),
            HealthAnswer::Unreachable(reason) => Err(LlamaStackError::Unreachable(reason)),
        }
    }

    async fn list_providers(&self, endpoint: &ServerEndpoint) -> Result<Vec<ProviderInfo>, LlamaStackError> {
        self.provider_calls.lock().unwrap().push(endpoint.base_url().to_string());
        self.providers
            .lock()
            .unwrap()
            .clone()
            .map_err(LlamaStackError::Unreachable)
    }
}
