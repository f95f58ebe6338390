//! Kubernetes resource watcher.
//!
//! Drives the reconciler with `kube_runtime::Controller`: the distribution
//! is the primary resource, and changes to the Deployment, Service,
//! NetworkPolicy and PVC it owns requeue it.
//!
//! Distribution events pass a generation filter, so the status write at
//! the end of every pass does not trigger another pass.

use crate::error::ControllerError;
use crate::reconciler::{resource_key, Reconciler};
use crds::LlamaStackDistribution;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::core::DynamicObject;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{self, Action, Config as ControllerConfig};
use kube_runtime::reflector::{self, ObjectRef};
use kube_runtime::{predicates, watcher, Controller, WatchStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Server-side watch timeout, kept below the watch client's read timeout
pub const WATCH_TIMEOUT_SECS: u32 = 25;

async fn reconcile(obj: Arc<LlamaStackDistribution>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let namespace = obj.namespace_or_default();
    let name = obj.name_any();
    debug!("Reconciling LlamaStackDistribution {}/{}", namespace, name);

    let outcome = ctx.reconcile(&namespace, &name).await?;
    Ok(match outcome.requeue_after {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    })
}

fn error_policy(obj: Arc<LlamaStackDistribution>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    let key = resource_key(&obj.namespace_or_default(), &obj.name_any());
    let (delay, error_count) = ctx.next_backoff(&key);
    error!(
        "Reconciliation error for LlamaStackDistribution {} (attempt {}), retrying in {}s: {}",
        key,
        error_count,
        delay.as_secs(),
        error
    );
    Action::requeue(delay)
}

/// Releases per-distribution state once the controller reports the
/// object gone; the reconciler is not called for deleted objects.
fn prune_deleted(reconciler: &Reconciler, obj_ref: &ObjectRef<DynamicObject>) {
    let namespace = obj_ref.namespace.as_deref().unwrap_or_default();
    debug!("LlamaStackDistribution {}/{} is gone, dropping its state", namespace, obj_ref.name);
    reconciler.forget(namespace, &obj_ref.name);
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Watches distributions and the children they own until the stream ends.
pub async fn watch_distributions(
    client: Client,
    namespace: Option<String>,
    reconciler: Arc<Reconciler>,
) -> Result<(), ControllerError> {
    info!(
        "Starting LlamaStackDistribution watcher ({})",
        namespace.as_deref().unwrap_or("all namespaces")
    );
    let ns = namespace.as_deref();
    let watch_config = watcher::Config::default().timeout(WATCH_TIMEOUT_SECS);

    // Debounce batches bursts of child events into one pass
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(4);

    let (reader, writer) = reflector::store();
    let distributions = watcher(api::<LlamaStackDistribution>(&client, ns), watch_config.clone())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicates::generation);

    Controller::for_stream(distributions, reader)
        .owns(api::<Deployment>(&client, ns), watch_config.clone())
        .owns(api::<Service>(&client, ns), watch_config.clone())
        .owns(api::<NetworkPolicy>(&client, ns), watch_config.clone())
        .owns(api::<PersistentVolumeClaim>(&client, ns), watch_config)
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::clone(&reconciler))
        .for_each(|res| {
            let reconciler = Arc::clone(&reconciler);
            async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled {}/{}", obj.namespace.as_deref().unwrap_or_default(), obj.name),
                    Err(controller::Error::ObjectNotFound(obj_ref)) => prune_deleted(&reconciler, &obj_ref),
                    Err(e) => error!("Controller error: {}", e),
                }
            }
        })
        .await;

    info!("LlamaStackDistribution watcher stopped");
    Ok(())
}
