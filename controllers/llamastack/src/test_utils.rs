//! Test utilities for unit testing the reconciler
//!
//! Builds distributions, an operator configuration and a reconciler wired
//! to the in-memory cluster and probe mocks.

use crate::config::{ClusterInfo, OperatorConfig};
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use cluster_client::MockClusterClient;
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use llamastack_client::MockServerProbe;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TEST_OPERATOR_NAMESPACE: &str = "llama-system";

/// Helper to create a test distribution using the "starter" image
pub fn create_test_distribution(name: &str, namespace: &str) -> LlamaStackDistribution {
    LlamaStackDistribution {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: LlamaStackDistributionSpec {
            replicas: 1,
            server: ServerSpec {
                distribution: DistributionType {
                    name: Some("starter".to_string()),
                    image: None,
                },
                ..Default::default()
            },
        },
        status: None,
    }
}

/// Operator configuration with a small image map
pub fn test_config() -> OperatorConfig {
    OperatorConfig {
        cluster_info: ClusterInfo::new(
            TEST_OPERATOR_NAMESPACE,
            BTreeMap::from([
                ("starter".to_string(), "docker.io/llamastack/distribution-starter:latest".to_string()),
                ("foo".to_string(), "quay.io/llamastack/foo:latest".to_string()),
            ]),
        ),
        watch_namespace: None,
        operator_version: Some("v0.0.0-test".to_string()),
        llama_stack_version: Some("0.2.0".to_string()),
        metrics_addr: ([127, 0, 0, 1], 0).into(),
    }
}

/// A reconciler plus handles on its mocks
pub struct TestHarness {
    pub reconciler: Reconciler,
    pub cluster: MockClusterClient,
    pub probe: MockServerProbe,
}

pub fn create_test_reconciler(enable_network_policy: bool) -> TestHarness {
    let cluster = MockClusterClient::new();
    let probe = MockServerProbe::new();
    let mut flags = FeatureFlags::default();
    flags.enable_network_policy.enabled = enable_network_policy;

    let reconciler = Reconciler::new(
        Arc::new(cluster.clone()),
        Arc::new(probe.clone()),
        test_config(),
        flags,
        Metrics::new().unwrap(),
    );
    TestHarness {
        reconciler,
        cluster,
        probe,
    }
}
