//! Spec change detection.
//!
//! Compares two snapshots of a distribution's spec (never metadata or
//! status) and renders a readable diff for the logs.

use crds::LlamaStackDistributionSpec;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Result of comparing two spec snapshots
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecChange {
    /// Whether reconciliation is needed because the spec moved
    pub changed: bool,
    /// One line per changed field, `path: old -> new`
    pub diff: Option<String>,
}

/// Compares two specs field by field.
pub fn compare_specs(old: &LlamaStackDistributionSpec, new: &LlamaStackDistributionSpec) -> SpecChange {
    if old == new {
        return SpecChange::default();
    }

    let old = serde_json::to_value(old).unwrap_or(Value::Null);
    let new = serde_json::to_value(new).unwrap_or(Value::Null);
    let mut lines = Vec::new();
    diff_values("spec", &old, &new, &mut lines);

    SpecChange {
        changed: true,
        diff: (!lines.is_empty()).then(|| lines.join("\n")),
    }
}

fn diff_values(path: &str, old: &Value, new: &Value, out: &mut Vec<String>) {
    match (old, new) {
        (Value::Object(o), Value::Object(n)) => {
            let mut keys: Vec<&String> = o.keys().chain(n.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child = format!("{}.{}", path, key);
                diff_values(&child, o.get(key).unwrap_or(&Value::Null), n.get(key).unwrap_or(&Value::Null), out);
            }
        }
        (o, n) if o != n => out.push(format!("{}: {} -> {}", path, o, n)),
        _ => {}
    }
}

/// Remembers the last spec seen per distribution.
#[derive(Debug, Default)]
pub struct SpecTracker {
    seen: Mutex<HashMap<String, LlamaStackDistributionSpec>>,
}

impl SpecTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `spec` for `key` and reports how it differs from the previous
    /// snapshot. The first snapshot for a key is not a change.
    pub fn observe(&self, key: &str, spec: &LlamaStackDistributionSpec) -> SpecChange {
        let Ok(mut seen) = self.seen.lock() else {
            return SpecChange::default();
        };
        let change = match seen.get(key) {
            Some(previous) => compare_specs(previous, spec),
            None => SpecChange::default(),
        };
        seen.insert(key.to_string(), spec.clone());
        change
    }

    /// Drops the snapshot for a deleted distribution.
    pub fn forget(&self, key: &str) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{DistributionType, ServerSpec};

    fn spec(replicas: i32, name: &str) -> LlamaStackDistributionSpec {
        LlamaStackDistributionSpec {
            replicas,
            server: ServerSpec {
                distribution: DistributionType {
                    name: Some(name.to_string()),
                    image: None,
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_identical_specs_are_unchanged() {
        let change = compare_specs(&spec(1, "starter"), &spec(1, "starter"));
        assert!(!change.changed);
        assert!(change.diff.is_none());
    }

    #[test]
    fn test_diff_lists_changed_fields() {
        let change = compare_specs(&spec(1, "starter"), &spec(3, "ollama"));
        assert!(change.changed);
        let diff = change.diff.unwrap();
        assert!(diff.contains("spec.replicas: 1 -> 3"), "{diff}");
        assert!(diff.contains(r#"spec.server.distribution.name: "starter" -> "ollama""#), "{diff}");
    }

    #[test]
    fn test_tracker_reports_changes_after_first_snapshot() {
        let tracker = SpecTracker::new();
        assert!(!tracker.observe("ns/a", &spec(1, "starter")).changed);
        assert!(!tracker.observe("ns/a", &spec(1, "starter")).changed);
        assert!(tracker.observe("ns/a", &spec(2, "starter")).changed);

        tracker.forget("ns/a");
        assert!(!tracker.observe("ns/a", &spec(5, "starter")).changed);
    }
}
