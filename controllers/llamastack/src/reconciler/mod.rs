//! Reconciliation logic for LlamaStackDistribution.
//!
//! One pass:
//! 1. fetch the distribution (gone means nothing to do)
//! 2. synchronize children: PVC, NetworkPolicy, Deployment, Service
//! 3. recompute and write the full status, even when step 2 failed
//! 4. requeue after 10s while the distribution is Initializing
//!
//! Child builders live in `storage`, `deployment`, `service` and
//! `network_policy`; status evaluation lives in `status`.

pub mod deployment;
pub mod network_policy;
pub mod service;
pub mod status;
pub mod storage;

#[cfg(test)]
mod network_policy_test;
#[cfg(test)]
mod status_test;

use crate::change::SpecTracker;
use crate::config::OperatorConfig;
use crate::deploy;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use cluster_client::ClusterClient;
use crds::{DistributionPhase, FeatureFlags, LlamaStackDistribution};
use llamastack_client::ServerProbe;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Requeue delay while a distribution is Initializing
pub const INITIALIZING_REQUEUE: Duration = Duration::from_secs(10);

/// Result of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Phase written to status (None when the distribution is gone)
    pub phase: Option<DistributionPhase>,
    /// Fixed-delay requeue, if any
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    fn deleted() -> Self {
        Self {
            phase: None,
            requeue_after: None,
        }
    }

    fn for_phase(phase: DistributionPhase) -> Self {
        let requeue_after = (phase == DistributionPhase::Initializing).then_some(INITIALIZING_REQUEUE);
        Self {
            phase: Some(phase),
            requeue_after,
        }
    }
}

/// First retry delay after a failed pass
pub const RETRY_MIN: Duration = Duration::from_secs(5);
/// Retry delays stop growing here
pub const RETRY_MAX: Duration = Duration::from_secs(300);

/// Consecutive failures of one resource.
///
/// Delays follow the Fibonacci sequence seeded with [`RETRY_MIN`]:
/// 5s, 5s, 10s, 15s, 25s, ... up to [`RETRY_MAX`].
#[derive(Debug, Clone, Copy, Default)]
struct BackoffState {
    failures: u32,
}

impl BackoffState {
    fn record_failure(&mut self) -> (Duration, u32) {
        self.failures = self.failures.saturating_add(1);
        (Self::delay(self.failures), self.failures)
    }

    fn delay(failures: u32) -> Duration {
        let (mut prev, mut current) = (Duration::ZERO, RETRY_MIN);
        for _ in 1..failures {
            if current >= RETRY_MAX {
                break;
            }
            (prev, current) = (current, (prev + current).min(RETRY_MAX));
        }
        current
    }
}

/// Reconciles LlamaStackDistribution resources.
pub struct Reconciler {
    pub(crate) cluster: Arc<dyn ClusterClient>,
    pub(crate) probe: Arc<dyn ServerProbe>,
    pub(crate) config: OperatorConfig,
    pub(crate) feature_flags: FeatureFlags,
    pub(crate) metrics: Metrics,
    spec_tracker: SpecTracker,
    /// Error tracking per resource (namespace/name -> BackoffState)
    backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("feature_flags", &self.feature_flags)
            .finish_non_exhaustive()
    }
}

pub(crate) fn resource_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl Reconciler {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        probe: Arc<dyn ServerProbe>,
        config: OperatorConfig,
        feature_flags: FeatureFlags,
        metrics: Metrics,
    ) -> Self {
        Self {
            cluster,
            probe,
            config,
            feature_flags,
            metrics,
            spec_tracker: SpecTracker::new(),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one reconciliation pass for `namespace/name`.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        let key = resource_key(namespace, name);
        let result = self.reconcile_inner(namespace, name, &key).await;

        match &result {
            Ok(outcome) => {
                self.metrics.record_success();
                if let Some(phase) = outcome.phase {
                    self.metrics.set_phase(namespace, name, phase);
                }
                self.reset_error(&key);
            }
            Err(e) => self.metrics.record_failure(e.kind_label()),
        }
        result
    }

    async fn reconcile_inner(&self, namespace: &str, name: &str, key: &str) -> Result<ReconcileOutcome, ControllerError> {
        let instance = self
            .cluster
            .get_distribution(namespace, name)
            .await
            .map_err(|e| ControllerError::cluster("get", "LlamaStackDistribution", e))?;

        let Some(instance) = instance else {
            info!("LlamaStackDistribution {} not found, skipping reconciliation", key);
            self.forget(namespace, name);
            return Ok(ReconcileOutcome::deleted());
        };

        let change = self.spec_tracker.observe(key, &instance.spec);
        if change.changed {
            info!("LlamaStackDistribution {} spec changed", key);
            if let Some(diff) = &change.diff {
                info!("{}", diff);
            }
            self.reset_error(key);
        }

        let sync_result = self.reconcile_resources(&instance).await;
        let status_result = self.update_status(&instance, sync_result.as_ref().err()).await;

        let phase = match (sync_result, status_result) {
            (Err(sync_err), Err(status_err)) => {
                // The synchronization error is the one reported
                error!("Failed to update status for {}: {}", key, status_err);
                return Err(sync_err);
            }
            (Err(sync_err), Ok(_)) => return Err(sync_err),
            (Ok(()), Err(status_err)) => {
                error!("Failed to update status for {}: {}", key, status_err);
                return Err(status_err);
            }
            (Ok(()), Ok(phase)) => phase,
        };

        let outcome = ReconcileOutcome::for_phase(phase);
        if outcome.requeue_after.is_some() {
            debug!("LlamaStackDistribution {} is {}, requeueing", key, phase);
        } else {
            info!("Successfully reconciled LlamaStackDistribution {} ({})", key, phase);
        }
        Ok(outcome)
    }

    /// Brings every child resource in line with the spec.
    ///
    /// Stops at the first failure. The distribution is validated and the
    /// image resolved before anything is written.
    pub(crate) async fn reconcile_resources(&self, instance: &LlamaStackDistribution) -> Result<(), ControllerError> {
        let image = self
            .config
            .cluster_info
            .resolve_image(&instance.spec.server.distribution)?;
        let owner = deploy::owner_reference(instance)?;

        if let Some(storage) = &instance.spec.server.storage {
            self.reconcile_pvc(instance, storage, &owner).await?;
        }

        self.reconcile_network_policy(instance, &owner).await?;
        self.reconcile_deployment(instance, &image, &owner).await?;

        if instance.has_ports() {
            self.reconcile_service(instance, &owner).await?;
        }
        Ok(())
    }

    /// Next retry delay for a failing resource; advances its backoff.
    ///
    /// Returns (delay, consecutive error count)
    pub fn next_backoff(&self, key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => states.entry(key.to_string()).or_default().record_failure(),
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (RETRY_MIN, 0)
            }
        }
    }

    /// Reset error count for a resource (on success or spec change)
    pub fn reset_error(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(key) {
                *state = BackoffState::default();
            }
        }
    }

    /// Drops everything held for a deleted distribution: its last seen
    /// spec, its backoff and its phase gauge.
    pub fn forget(&self, namespace: &str, name: &str) {
        let key = resource_key(namespace, name);
        self.spec_tracker.forget(&key);
        self.metrics.forget(namespace, name);
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(&key);
        }
    }
}
