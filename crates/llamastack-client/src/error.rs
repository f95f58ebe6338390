//! LlamaStack client errors

use thiserror::Error;

/// Errors that can occur when probing a LlamaStack server
#[derive(Debug, Error)]
pub enum LlamaStackError {
    /// Transport failure (connection refused, DNS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status code
    #[error("server returned status code {0}")]
    Status(u16),

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Server could not be reached (raised without a reqwest error, e.g. by mocks)
    #[error("server unreachable: {0}")]
    Unreachable(String),
}

impl LlamaStackError {
    /// True when no HTTP response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(self, LlamaStackError::Http(_) | LlamaStackError::Unreachable(_))
    }
}
