//! Status evaluation
//!
//! Phase and conditions are recomputed from scratch on every pass. A
//! synchronization error wins over everything else; otherwise the phase
//! follows the Deployment's replica counts and, once all replicas are
//! ready, the server's health endpoint.

use super::Reconciler;
use crate::error::ControllerError;
use crds::{
    DistributionPhase, LlamaStackDistribution, LlamaStackDistributionStatus, MESSAGE_DEPLOYMENT_PENDING,
    MESSAGE_DEPLOYMENT_READY, MESSAGE_HEALTH_CHECK_FAILED, MESSAGE_HEALTH_CHECK_PASSED, MESSAGE_SERVICE_READY,
    MESSAGE_STORAGE_READY,
};
use kube::ResourceExt;
use llamastack_client::ServerEndpoint;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Health condition message while the Deployment is not ready
pub const MESSAGE_DEPLOYMENT_NOT_READY: &str = "Deployment not ready";

impl Reconciler {
    /// Computes the new status without writing it.
    ///
    /// Returns an error only when the Deployment cannot be read for a reason
    /// other than not-found; in that case nothing should be persisted.
    pub(crate) async fn evaluate_status(
        &self,
        instance: &LlamaStackDistribution,
        sync_error: Option<&ControllerError>,
    ) -> Result<LlamaStackDistributionStatus, ControllerError> {
        let mut status = instance.status.clone().unwrap_or_default();

        if status.version.operator_version.is_none() {
            status.version.operator_version = self.config.operator_version.clone();
        }

        if let Some(err) = sync_error {
            status.phase = DistributionPhase::Failed;
            status.set_deployment_ready(false, format!("Resource reconciliation failed: {}", err));
            status.distribution_config.providers.clear();
        } else {
            let deployment_ready = self.evaluate_deployment(instance, &mut status).await?;
            self.evaluate_storage(instance, &mut status).await;
            self.evaluate_service(instance, &mut status).await;
            self.evaluate_distribution_config(instance, &mut status);

            if deployment_ready {
                self.perform_health_checks(instance, &mut status).await;
            } else {
                status.set_health_check(false, MESSAGE_DEPLOYMENT_NOT_READY);
                status.distribution_config.providers.clear();
            }
        }

        status.version.last_updated = Some(chrono::Utc::now());
        Ok(status)
    }

    /// Evaluates and persists the full status. Returns the computed phase.
    ///
    /// The status is written on every pass; the watcher only reacts to
    /// generation changes, so the write does not retrigger reconciliation.
    pub(crate) async fn update_status(
        &self,
        instance: &LlamaStackDistribution,
        sync_error: Option<&ControllerError>,
    ) -> Result<DistributionPhase, ControllerError> {
        let status = self.evaluate_status(instance, sync_error).await?;
        let phase = status.phase;

        self.cluster
            .update_distribution_status(
                &instance.namespace_or_default(),
                &instance.name_any(),
                instance.metadata.resource_version.as_deref(),
                &status,
            )
            .await
            .map_err(|e| ControllerError::cluster("update", "LlamaStackDistribution status", e))?;
        Ok(phase)
    }

    /// Sets phase and the DeploymentReady condition from replica counts.
    /// Returns whether all desired replicas are ready.
    async fn evaluate_deployment(
        &self,
        instance: &LlamaStackDistribution,
        status: &mut LlamaStackDistributionStatus,
    ) -> Result<bool, ControllerError> {
        let namespace = instance.namespace_or_default();
        let deployment = self
            .cluster
            .get_deployment(&namespace, &instance.name_any())
            .await
            .map_err(|e| ControllerError::cluster("get", "Deployment", e))?;

        let Some(deployment) = deployment else {
            status.phase = DistributionPhase::Pending;
            status.set_deployment_ready(false, MESSAGE_DEPLOYMENT_PENDING);
            status.available_replicas = 0;
            return Ok(false);
        };

        let ready = deployment.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
        let desired = instance.spec.replicas;
        status.available_replicas = ready;

        if ready == 0 {
            status.phase = DistributionPhase::Initializing;
            status.set_deployment_ready(false, MESSAGE_DEPLOYMENT_PENDING);
            return Ok(false);
        }

        match ready.cmp(&desired) {
            Ordering::Less => {
                status.phase = DistributionPhase::Initializing;
                status.set_deployment_ready(
                    false,
                    format!("Deployment is scaling: {}/{} replicas ready", ready, desired),
                );
                Ok(false)
            }
            // More ready replicas than requested is still a transition
            Ordering::Greater => {
                status.phase = DistributionPhase::Initializing;
                status.set_deployment_ready(
                    false,
                    format!("Deployment is scaling down: {}/{} replicas ready", ready, desired),
                );
                Ok(false)
            }
            Ordering::Equal => {
                status.phase = DistributionPhase::Ready;
                status.set_deployment_ready(true, MESSAGE_DEPLOYMENT_READY);
                if status.version.llama_stack_server_version.is_none() {
                    status.version.llama_stack_server_version = self.config.llama_stack_version.clone();
                }
                Ok(true)
            }
        }
    }

    async fn evaluate_storage(&self, instance: &LlamaStackDistribution, status: &mut LlamaStackDistributionStatus) {
        if instance.spec.server.storage.is_none() {
            return;
        }
        let namespace = instance.namespace_or_default();
        let name = instance.pvc_name();

        match self.cluster.get_pvc(&namespace, &name).await {
            Ok(Some(pvc)) => {
                let phase = pvc.status.and_then(|s| s.phase).unwrap_or_default();
                if phase == "Bound" {
                    status.set_storage_ready(true, MESSAGE_STORAGE_READY);
                } else {
                    status.set_storage_ready(false, format!("PVC is not bound: {}", phase));
                }
            }
            Ok(None) => {
                status.set_storage_ready(false, format!("Failed to get PVC: {} not found", name));
            }
            Err(e) => {
                status.set_storage_ready(false, format!("Failed to get PVC: {}", e));
            }
        }
    }

    async fn evaluate_service(&self, instance: &LlamaStackDistribution, status: &mut LlamaStackDistributionStatus) {
        if !instance.has_ports() {
            debug!("No ports defined, skipping service status");
            return;
        }
        let namespace = instance.namespace_or_default();
        let name = instance.service_name();

        match self.cluster.get_service(&namespace, &name).await {
            Ok(Some(_)) => status.set_service_ready(true, MESSAGE_SERVICE_READY),
            Ok(None) => status.set_service_ready(false, format!("Failed to get Service: {} not found", name)),
            Err(e) => status.set_service_ready(false, format!("Failed to get Service: {}", e)),
        }
    }

    fn evaluate_distribution_config(&self, instance: &LlamaStackDistribution, status: &mut LlamaStackDistributionStatus) {
        status.distribution_config.available_distributions = self.config.cluster_info.distribution_images.clone();
        status.distribution_config.active_distribution = instance.active_distribution();
    }

    /// Probes health, then providers.
    ///
    /// A transport failure leaves the distribution Initializing; a non-200
    /// answer marks it Failed. Providers are kept only when health passed.
    async fn perform_health_checks(&self, instance: &LlamaStackDistribution, status: &mut LlamaStackDistributionStatus) {
        let endpoint = ServerEndpoint::in_cluster(
            &instance.service_name(),
            &instance.namespace_or_default(),
            instance.service_port(),
        );

        let healthy = match self.probe.check_health(&endpoint).await {
            Err(e) => {
                status.phase = DistributionPhase::Initializing;
                status.set_health_check(false, format!("Health check failed: {}", e));
                false
            }
            Ok(false) => {
                status.phase = DistributionPhase::Failed;
                status.set_health_check(false, MESSAGE_HEALTH_CHECK_FAILED);
                false
            }
            Ok(true) => {
                status.phase = DistributionPhase::Ready;
                status.set_health_check(true, MESSAGE_HEALTH_CHECK_PASSED);
                true
            }
        };

        match self.probe.list_providers(&endpoint).await {
            Ok(providers) if healthy => status.distribution_config.providers = providers,
            Ok(_) => {
                debug!("Discarding provider list from {}, health check did not pass", endpoint);
                status.distribution_config.providers.clear();
            }
            Err(e) => {
                warn!("Failed to get provider info from {}, clearing provider list: {}", endpoint, e);
                status.distribution_config.providers.clear();
            }
        }
    }
}
