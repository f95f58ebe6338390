//! Main controller implementation.
//!
//! Wires the Kubernetes clients, feature flags, probe client, metrics
//! server and watcher together, then waits for either task to exit.

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::feature_flags::load_feature_flags;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::watch_distributions;
use cluster_client::{ClusterClient, KubeClusterClient};
use kube::Client;
use llamastack_client::LlamaStackClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Deadline for individual reads and writes issued during a pass
pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout of the watch client (must exceed the watch timeout)
pub const WATCH_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a client from the in-cluster or kubeconfig environment.
pub async fn build_client(read_timeout: Duration) -> Result<Client, ControllerError> {
    let mut config = kube::Config::infer()
        .await
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to infer Kubernetes config: {}", e)))?;
    config.connect_timeout = Some(STORE_TIMEOUT);
    config.read_timeout = Some(read_timeout);
    config.write_timeout = Some(STORE_TIMEOUT);
    Ok(Client::try_from(config)?)
}

/// Main controller for LlamaStackDistribution resources.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller").finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing LlamaStack Controller");

        let store_client = build_client(STORE_TIMEOUT).await?;
        let watch_client = build_client(WATCH_READ_TIMEOUT).await?;
        let cluster: Arc<dyn ClusterClient> = Arc::new(KubeClusterClient::new(store_client));

        // Feature flags are read once; changing them requires a restart
        let feature_flags = load_feature_flags(cluster.as_ref(), &config.cluster_info.operator_namespace).await?;

        let probe = LlamaStackClient::new()
            .map_err(|e| ControllerError::InvalidConfig(format!("failed to build probe client: {}", e)))?;

        let metrics = Metrics::new()?;
        let metrics_server = tokio::spawn(metrics::serve(config.metrics_addr, metrics.clone()));

        let watch_namespace = config.watch_namespace.clone();
        let reconciler = Arc::new(Reconciler::new(
            cluster,
            Arc::new(probe),
            config,
            feature_flags,
            metrics.clone(),
        ));

        let watcher = tokio::spawn(watch_distributions(watch_client, watch_namespace, reconciler));
        metrics.set_ready(true);

        Ok(Self {
            watcher,
            metrics_server,
        })
    }

    /// Runs until the watcher stops or the metrics server fails.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        tokio::select! {
            result = &mut self.watcher => {
                result.map_err(|e| ControllerError::Watch(format!("LlamaStackDistribution watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("LlamaStackDistribution watcher error: {}", e)))?;
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Metrics(format!("metrics server panicked: {}", e)))??;
            }
        }
        Ok(())
    }
}
