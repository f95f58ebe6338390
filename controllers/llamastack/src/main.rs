//! LlamaStack Controller
//!
//! Converges LlamaStackDistribution resources into a running inference
//! server: a Deployment, an optional Service, an optional
//! PersistentVolumeClaim and an optional ingress NetworkPolicy, and
//! reports the server's readiness and providers in status.

mod change;
mod config;
mod controller;
mod deploy;
mod error;
mod feature_flags;
mod metrics;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // Configure rustls crypto provider before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| ControllerError::InvalidConfig("failed to install rustls crypto provider".to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting LlamaStack Controller");

    let config = OperatorConfig::from_env()?;

    info!("Configuration:");
    info!("  Operator namespace: {}", config.cluster_info.operator_namespace);
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Operator version: {}", config.operator_version.as_deref().unwrap_or("unknown"));
    info!("  Distributions: {}", config.cluster_info.distribution_images.len());
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
