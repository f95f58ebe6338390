//! LlamaStack server probe client
//!
//! Talks to a running LlamaStack server over plain HTTP inside the cluster:
//!
//! - `GET /v1/health`: liveness, healthy iff the server answers 200
//! - `GET /v1/providers`: providers configured in the running distribution
//!
//! # Example
//!
//! ```no_run
//! use llamastack_client::{LlamaStackClient, ServerEndpoint, ServerProbe};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LlamaStackClient::new()?;
//! let endpoint = ServerEndpoint::in_cluster("demo-service", "default", 8321);
//! if client.check_health(&endpoint).await? {
//!     let providers = client.list_providers(&endpoint).await?;
//!     println!("{} providers", providers.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod probe_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{LlamaStackClient, DEFAULT_TIMEOUT};
pub use error::LlamaStackError;
pub use models::{ProvidersResponse, ServerEndpoint};
pub use probe_trait::ServerProbe;
#[cfg(feature = "test-util")]
pub use mock::{HealthAnswer, MockServerProbe};
