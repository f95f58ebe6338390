//! Unit tests for the NetworkPolicy builder and the feature toggle

#[cfg(test)]
mod tests {
    use super::super::network_policy::build_network_policy;
    use crate::test_utils::*;
    use serde_json::json;

    #[test]
    fn test_policy_has_two_ingress_rules_on_service_port() {
        let mut instance = create_test_distribution("demo", "ai");
        instance.spec.server.container_spec.ports = vec![9000];

        let policy = build_network_policy(&instance, TEST_OPERATOR_NAMESPACE);
        assert_eq!(policy.metadata.name.as_deref(), Some("demo-network-policy"));

        let spec = serde_json::to_value(policy.spec.unwrap()).unwrap();
        assert_eq!(
            spec["podSelector"],
            json!({"matchLabels": {"app": "llama-stack", "app.kubernetes.io/instance": "demo"}})
        );
        assert_eq!(spec["policyTypes"], json!(["Ingress"]));

        let rules = spec["ingress"].as_array().unwrap();
        assert_eq!(rules.len(), 2);
        for rule in rules {
            assert_eq!(rule["ports"], json!([{"protocol": "TCP", "port": 9000}]));
        }

        assert_eq!(
            rules[0]["from"],
            json!([{
                "podSelector": {"matchLabels": {"app.kubernetes.io/part-of": "llama-stack"}},
                "namespaceSelector": {}
            }])
        );
        assert_eq!(
            rules[1]["from"],
            json!([{
                "podSelector": {},
                "namespaceSelector": {"matchLabels": {"kubernetes.io/metadata.name": "llama-system"}}
            }])
        );
    }

    #[test]
    fn test_policy_uses_default_port_without_ports() {
        let instance = create_test_distribution("demo", "ai");
        let spec = serde_json::to_value(build_network_policy(&instance, "ops").spec.unwrap()).unwrap();
        assert_eq!(spec["ingress"][0]["ports"][0]["port"], json!(8321));
        assert_eq!(spec["ingress"][1]["ports"][0]["port"], json!(8321));
    }

    #[tokio::test]
    async fn test_enabled_flag_creates_policy() {
        let harness = create_test_reconciler(true);
        harness.cluster.add_distribution(create_test_distribution("demo", "ai"));

        harness.reconciler.reconcile("ai", "demo").await.unwrap();

        let policy = harness.cluster.network_policy("ai", "demo-network-policy").unwrap();
        let owners = policy.metadata.owner_references.unwrap();
        assert_eq!(owners[0].uid, "uid-demo");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[tokio::test]
    async fn test_disabled_flag_removes_existing_policy() {
        let harness = create_test_reconciler(false);
        let instance = create_test_distribution("demo", "ai");
        harness
            .cluster
            .add_network_policy("ai", build_network_policy(&instance, TEST_OPERATOR_NAMESPACE));
        harness.cluster.add_distribution(instance);

        harness.reconciler.reconcile("ai", "demo").await.unwrap();

        assert!(harness.cluster.network_policy("ai", "demo-network-policy").is_none());
        assert!(harness
            .cluster
            .writes()
            .contains(&"delete NetworkPolicy ai/demo-network-policy".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_flag_without_policy_is_noop() {
        let harness = create_test_reconciler(false);
        harness.cluster.add_distribution(create_test_distribution("demo", "ai"));

        harness.reconciler.reconcile("ai", "demo").await.unwrap();

        assert!(harness.cluster.network_policy("ai", "demo-network-policy").is_none());
        assert!(!harness.cluster.writes().iter().any(|w| w.contains("NetworkPolicy")));
    }
}
