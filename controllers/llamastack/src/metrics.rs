//! Prometheus metrics and probe endpoints.
//!
//! Serves `/metrics`, `/healthz` and `/readyz` on the metrics address.
//! `/readyz` only turns OK once the controller has started watching.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use crds::DistributionPhase;
use prometheus::{opts, Encoder, IntCounterVec, IntGaugeVec, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

const PHASES: [DistributionPhase; 4] = [
    DistributionPhase::Pending,
    DistributionPhase::Initializing,
    DistributionPhase::Ready,
    DistributionPhase::Failed,
];

/// Controller metrics, registered in a registry owned by this value
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    failures: IntCounterVec,
    phase: IntGaugeVec,
    ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("ready", &self.ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();
        let reconciliations = IntCounterVec::new(
            opts!("llamastack_reconciliations_total", "Reconciliation passes by result"),
            &["result"],
        )
        .map_err(|e| ControllerError::Metrics(e.to_string()))?;
        let failures = IntCounterVec::new(
            opts!("llamastack_reconcile_failures_total", "Failed reconciliation passes by error kind"),
            &["kind"],
        )
        .map_err(|e| ControllerError::Metrics(e.to_string()))?;
        let phase = IntGaugeVec::new(
            opts!("llamastack_distribution_phase", "1 for the current phase of each distribution"),
            &["namespace", "name", "phase"],
        )
        .map_err(|e| ControllerError::Metrics(e.to_string()))?;

        registry
            .register(Box::new(reconciliations.clone()))
            .map_err(|e| ControllerError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(failures.clone()))
            .map_err(|e| ControllerError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(phase.clone()))
            .map_err(|e| ControllerError::Metrics(e.to_string()))?;

        Ok(Self {
            registry,
            reconciliations,
            failures,
            phase,
            ready: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn record_success(&self) {
        self.reconciliations.with_label_values(&["success"]).inc();
    }

    pub fn record_failure(&self, kind: &str) {
        self.reconciliations.with_label_values(&["error"]).inc();
        self.failures.with_label_values(&[kind]).inc();
    }

    /// Sets the gauge for `phase` to 1 and the other phases to 0.
    pub fn set_phase(&self, namespace: &str, name: &str, phase: DistributionPhase) {
        for p in PHASES {
            let value = i64::from(p == phase);
            self.phase.with_label_values(&[namespace, name, p.as_str()]).set(value);
        }
    }

    /// Removes the phase series of a deleted distribution.
    pub fn forget(&self, namespace: &str, name: &str) {
        for p in PHASES {
            let _ = self.phase.remove_label_values(&[namespace, name, p.as_str()]);
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Text exposition of every registered metric
    pub fn encode(&self) -> Result<String, ControllerError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| ControllerError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| ControllerError::Metrics(e.to_string()))
    }
}

async fn metrics_handler(State(metrics): State<Metrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (StatusCode::OK, [("Content-Type", "text/plain; version=0.0.4")], body).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz(State(metrics): State<Metrics>) -> impl IntoResponse {
    if metrics.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub fn router(metrics: Metrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(metrics)
}

/// Serves the metrics router until the process exits.
pub async fn serve(addr: SocketAddr, metrics: Metrics) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Metrics(format!("failed to bind {}: {}", addr, e)))?;
    info!("Serving metrics and probes on {}", addr);
    axum::serve(listener, router(metrics))
        .await
        .map_err(|e| ControllerError::Metrics(e.to_string()))
}
