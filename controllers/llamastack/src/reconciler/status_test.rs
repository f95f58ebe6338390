//! Unit tests for status evaluation

#[cfg(test)]
mod tests {
    use super::super::deployment::build_deployment;
    use super::super::service::build_service;
    use super::super::status::MESSAGE_DEPLOYMENT_NOT_READY;
    use crate::error::ControllerError;
    use crate::test_utils::*;
    use crds::*;
    use llamastack_client::HealthAnswer;

    const IMAGE: &str = "docker.io/llamastack/distribution-starter:latest";

    /// Distribution with `desired` replicas whose Deployment reports `ready`
    fn harness_with_replicas(desired: i32, ready: Option<i32>) -> (TestHarness, LlamaStackDistribution) {
        let harness = create_test_reconciler(false);
        let mut instance = create_test_distribution("demo", "ai");
        instance.spec.replicas = desired;
        harness.cluster.add_distribution(instance.clone());
        harness.cluster.add_deployment("ai", build_deployment(&instance, IMAGE));
        if let Some(ready) = ready {
            harness.cluster.set_deployment_ready_replicas("ai", "demo", ready);
        }
        (harness, instance)
    }

    fn provider(id: &str) -> ProviderInfo {
        ProviderInfo {
            api: "inference".to_string(),
            provider_id: id.to_string(),
            provider_type: format!("remote::{}", id),
            health: None,
        }
    }

    #[tokio::test]
    async fn test_missing_deployment_is_pending() {
        let harness = create_test_reconciler(false);
        let instance = create_test_distribution("demo", "ai");

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Pending);
        let condition = status.condition(CONDITION_DEPLOYMENT_READY).unwrap();
        assert!(!condition.is_true());
        assert_eq!(condition.message, MESSAGE_DEPLOYMENT_PENDING);
    }

    #[tokio::test]
    async fn test_no_ready_replicas_is_initializing() {
        let (harness, instance) = harness_with_replicas(3, Some(0));

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Initializing);
        assert_eq!(status.available_replicas, 0);
    }

    #[tokio::test]
    async fn test_partial_readiness_reports_scaling() {
        let (harness, instance) = harness_with_replicas(3, Some(2));

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Initializing);
        assert_eq!(status.available_replicas, 2);
        let condition = status.condition(CONDITION_DEPLOYMENT_READY).unwrap();
        assert!(!condition.is_true());
        assert!(condition.message.contains("2/3"));
    }

    #[tokio::test]
    async fn test_scaling_down_stays_initializing() {
        let (harness, instance) = harness_with_replicas(3, Some(4));

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Initializing);
        assert!(status
            .condition(CONDITION_DEPLOYMENT_READY)
            .unwrap()
            .message
            .contains("scaling down"));
    }

    #[tokio::test]
    async fn test_all_ready_and_healthy_is_ready() {
        let (harness, instance) = harness_with_replicas(3, Some(3));
        harness.probe.set_providers(vec![provider("ollama")]);

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Ready);
        assert_eq!(status.available_replicas, 3);
        assert!(status.condition(CONDITION_DEPLOYMENT_READY).unwrap().is_true());
        let health = status.condition(CONDITION_HEALTH_CHECK).unwrap();
        assert!(health.is_true());
        assert_eq!(health.message, MESSAGE_HEALTH_CHECK_PASSED);
        assert_eq!(status.distribution_config.providers, vec![provider("ollama")]);

        // Probed through the in-cluster service address
        let calls = harness.probe.health_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("demo-service.ai.svc"));
        assert!(calls[0].ends_with(":8321"));
    }

    #[tokio::test]
    async fn test_not_ready_skips_probe_and_clears_providers() {
        let (harness, mut instance) = harness_with_replicas(3, Some(1));
        let mut previous = LlamaStackDistributionStatus::default();
        previous.distribution_config.providers = vec![provider("stale")];
        instance.status = Some(previous);

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert!(harness.probe.health_calls().is_empty());
        assert!(harness.probe.provider_calls().is_empty());
        assert!(status.distribution_config.providers.is_empty());
        let health = status.condition(CONDITION_HEALTH_CHECK).unwrap();
        assert!(!health.is_true());
        assert_eq!(health.message, MESSAGE_DEPLOYMENT_NOT_READY);
    }

    #[tokio::test]
    async fn test_unreachable_server_stays_initializing() {
        let (harness, instance) = harness_with_replicas(1, Some(1));
        harness.probe.set_health(HealthAnswer::Unreachable("connection refused".to_string()));
        harness.probe.set_providers(vec![provider("ollama")]);

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Initializing);
        let health = status.condition(CONDITION_HEALTH_CHECK).unwrap();
        assert!(!health.is_true());
        assert!(health.message.starts_with("Health check failed:"));
        assert!(status.distribution_config.providers.is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_server_is_failed() {
        let (harness, instance) = harness_with_replicas(1, Some(1));
        harness.probe.set_health(HealthAnswer::Unhealthy);
        harness.probe.set_providers(vec![provider("ollama")]);

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Failed);
        assert_eq!(status.available_replicas, 1);
        assert_eq!(status.condition(CONDITION_HEALTH_CHECK).unwrap().message, MESSAGE_HEALTH_CHECK_FAILED);
        assert!(status.distribution_config.providers.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_clears_list_but_stays_ready() {
        let (harness, mut instance) = harness_with_replicas(1, Some(1));
        let mut previous = LlamaStackDistributionStatus::default();
        previous.distribution_config.providers = vec![provider("stale")];
        instance.status = Some(previous);
        harness.probe.fail_providers("connection reset");

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Ready);
        assert!(status.distribution_config.providers.is_empty());
    }

    #[tokio::test]
    async fn test_sync_error_is_failed() {
        let (harness, instance) = harness_with_replicas(1, Some(1));
        let err = ControllerError::DistributionNotFound("bogus".to_string());

        let status = harness.reconciler.evaluate_status(&instance, Some(&err)).await.unwrap();
        assert_eq!(status.phase, DistributionPhase::Failed);
        let condition = status.condition(CONDITION_DEPLOYMENT_READY).unwrap();
        assert!(!condition.is_true());
        assert!(condition.message.starts_with("Resource reconciliation failed:"));
        assert!(condition.message.contains("bogus"));
        assert!(harness.probe.health_calls().is_empty());
    }

    #[tokio::test]
    async fn test_storage_condition_follows_claim_phase() {
        let harness = create_test_reconciler(false);
        let mut instance = create_test_distribution("demo", "ai");
        instance.spec.server.storage = Some(StorageSpec::default());

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        let storage = status.condition(CONDITION_STORAGE_READY).unwrap();
        assert!(!storage.is_true());
        assert_eq!(storage.message, "Failed to get PVC: demo-pvc not found");

        harness
            .cluster
            .add_pvc("ai", super::super::storage::build_pvc(&instance, &StorageSpec::default()));
        harness.cluster.set_pvc_phase("ai", "demo-pvc", "Pending");
        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.condition(CONDITION_STORAGE_READY).unwrap().message, "PVC is not bound: Pending");

        harness.cluster.set_pvc_phase("ai", "demo-pvc", "Bound");
        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        let storage = status.condition(CONDITION_STORAGE_READY).unwrap();
        assert!(storage.is_true());
        assert_eq!(storage.message, MESSAGE_STORAGE_READY);
    }

    #[tokio::test]
    async fn test_no_storage_no_storage_condition() {
        let harness = create_test_reconciler(false);
        let instance = create_test_distribution("demo", "ai");

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert!(status.condition(CONDITION_STORAGE_READY).is_none());
    }

    #[tokio::test]
    async fn test_service_condition_only_with_ports() {
        let harness = create_test_reconciler(false);
        let mut instance = create_test_distribution("demo", "ai");

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert!(status.condition(CONDITION_SERVICE_READY).is_none());

        instance.spec.server.container_spec.ports = vec![8321];
        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert!(!status.condition(CONDITION_SERVICE_READY).unwrap().is_true());

        let owner = crate::deploy::owner_reference(&instance).unwrap();
        crate::deploy::apply_service(&harness.cluster, "ai", &owner, build_service(&instance))
            .await
            .unwrap();
        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        let service = status.condition(CONDITION_SERVICE_READY).unwrap();
        assert!(service.is_true());
        assert_eq!(service.message, MESSAGE_SERVICE_READY);
    }

    #[tokio::test]
    async fn test_distribution_config_and_versions() {
        let (harness, instance) = harness_with_replicas(1, Some(0));

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.distribution_config.active_distribution.as_deref(), Some("starter"));
        assert_eq!(status.distribution_config.available_distributions.len(), 2);
        assert_eq!(status.version.operator_version.as_deref(), Some("v0.0.0-test"));
        // Server version is only known once the Deployment is ready
        assert!(status.version.llama_stack_server_version.is_none());
        assert!(status.version.last_updated.is_some());

        harness.cluster.set_deployment_ready_replicas("ai", "demo", 1);
        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.version.llama_stack_server_version.as_deref(), Some("0.2.0"));
    }

    #[tokio::test]
    async fn test_explicit_image_reports_custom() {
        let harness = create_test_reconciler(false);
        let mut instance = create_test_distribution("demo", "ai");
        instance.spec.server.distribution = DistributionType {
            name: None,
            image: Some("ghcr.io/acme/llama:1.0".to_string()),
        };

        let status = harness.reconciler.evaluate_status(&instance, None).await.unwrap();
        assert_eq!(status.distribution_config.active_distribution.as_deref(), Some("custom"));
    }

    #[tokio::test]
    async fn test_deployment_read_error_fails_evaluation() {
        let (harness, instance) = harness_with_replicas(1, Some(1));
        harness.cluster.fail_deployment_reads(Some("etcd unavailable"));

        let result = harness.reconciler.update_status(&instance, None).await;
        assert!(matches!(result, Err(ControllerError::Cluster { kind: "Deployment", .. })));
        assert!(harness.cluster.writes().is_empty());
    }
}
