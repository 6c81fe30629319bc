//! # Diff
//!
//! Classifies expected objects against observed ones as create, update or
//! delete and computes the JSON merge patch of each update.
//!
//! The patch is three-way: the last-applied annotation is the original, the
//! expected object the modified state and the observed object the current
//! state. A field present in the expected object counts as equal when the
//! observed value contains it, so fields defaulted by the API server never
//! produce patches. Fields dropped from the expected object since the last
//! apply are removed with `null`.
//!
//! Secret payloads never reach the annotation: the baseline of a Secret keeps
//! its keys but replaces every value with a sha256 digest. Values are always
//! compared against the observed object, the baseline only drives removals.

use crate::constants::LAST_APPLIED_ANNOTATION;
use crate::controller::reconciler::phase::ManagedResource;
use crate::controller::reconciler::types::PhaseError;
use crate::crd::Kibana;
use kube::{Resource, ResourceExt};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Metadata fields owned by the API server
const SERVER_METADATA: [&str; 8] = [
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "generation",
    "managedFields",
    "selfLink",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
];

/// Secret fields whose values are digested in the baseline
const SECRET_PAYLOAD: [&str; 2] = ["data", "stringData"];

/// Expected object plus the merge patch that brings the observed one to it
#[derive(Debug, Clone)]
pub struct Update<K> {
    pub expected: K,
    pub patch: Value,
}

/// Outcome of one phase diff
#[derive(Debug, Clone)]
pub struct Diff<K> {
    pub create: Vec<K>,
    pub update: Vec<Update<K>>,
    pub delete: Vec<K>,
    /// Observed objects already matching their expected counterpart
    pub unchanged: Vec<K>,
}

impl<K> Default for Diff<K> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<K> Diff<K> {
    /// Nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Diff `expected` against `observed`
///
/// Every expected object gets the controller owner reference to `kibana` and
/// the last-applied annotation before it is compared.
///
/// # Errors
///
/// Fails when `kibana` has no UID yet or an object does not serialize.
pub fn diff<K: ManagedResource>(
    kibana: &Kibana,
    mut observed: Vec<K>,
    expected: Vec<K>,
) -> Result<Diff<K>, PhaseError> {
    let owner = kibana
        .controller_owner_ref(&())
        .ok_or_else(|| PhaseError::Validation("Kibana resource has no uid yet".to_string()))?;

    let mut result = Diff::default();
    for mut object in expected {
        *object.owner_references_mut() = vec![owner.clone()];
        let modified = normalize(serde_json::to_value(&object)?);
        let kind = K::kind(&());
        let baseline = serde_json::to_string(&redact_payload(&kind, &modified))?;
        object
            .annotations_mut()
            .insert(LAST_APPLIED_ANNOTATION.to_string(), baseline.clone());

        let name = object.name_any();
        let Some(position) = observed.iter().position(|o| o.name_any() == name) else {
            result.create.push(object);
            continue;
        };
        let current_object = observed.swap_remove(position);

        let original = current_object
            .annotations()
            .get(LAST_APPLIED_ANNOTATION)
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
        let current = normalize(serde_json::to_value(&current_object)?);

        match three_way(original.as_ref(), &modified, &current) {
            None => result.unchanged.push(current_object),
            Some(mut patch) => {
                let metadata = patch
                    .as_object_mut()
                    .map(|p| p.entry("metadata").or_insert_with(|| Value::Object(Map::new())));
                if let Some(Value::Object(metadata)) = metadata {
                    let annotations = metadata
                        .entry("annotations")
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(annotations) = annotations {
                        annotations.insert(
                            LAST_APPLIED_ANNOTATION.to_string(),
                            Value::String(baseline),
                        );
                    }
                    if let Some(version) = current_object.meta().resource_version.clone() {
                        metadata.insert("resourceVersion".to_string(), Value::String(version));
                    }
                }
                result.update.push(Update {
                    expected: object,
                    patch,
                });
            }
        }
    }
    result.delete = observed;
    Ok(result)
}

/// Drop nulls, status, server owned metadata and the baseline annotation
#[must_use]
pub fn normalize(value: Value) -> Value {
    let mut value = prune_nulls(value);
    if let Value::Object(root) = &mut value {
        root.remove("status");
        if let Some(Value::Object(metadata)) = root.get_mut("metadata") {
            for field in SERVER_METADATA {
                metadata.remove(field);
            }
            let now_empty = match metadata.get_mut("annotations") {
                Some(Value::Object(annotations)) => {
                    annotations.remove(LAST_APPLIED_ANNOTATION).is_some() && annotations.is_empty()
                }
                _ => false,
            };
            if now_empty {
                metadata.remove("annotations");
            }
        }
    }
    value
}

/// Baseline form of `value`: Secret payload values become `sha256:<hex>`
#[must_use]
pub fn redact_payload(kind: &str, value: &Value) -> Value {
    let mut value = value.clone();
    if kind != "Secret" {
        return value;
    }
    if let Value::Object(root) = &mut value {
        for field in SECRET_PAYLOAD {
            if let Some(Value::Object(entries)) = root.get_mut(field) {
                for entry in entries.values_mut() {
                    let raw = entry.as_str().unwrap_or_default();
                    *entry = Value::String(format!("sha256:{:x}", Sha256::digest(raw.as_bytes())));
                }
            }
        }
    }
    value
}

fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(prune_nulls).collect()),
        other => other,
    }
}

/// Whether every field of `expected` is present in `observed` with a containing value
///
/// Arrays must have the same length and match element-wise.
#[must_use]
pub fn is_subset(expected: &Value, observed: &Value) -> bool {
    match (expected, observed) {
        (Value::Object(e), Value::Object(o)) => e
            .iter()
            .all(|(k, ev)| o.get(k).is_some_and(|ov| is_subset(ev, ov))),
        (Value::Array(e), Value::Array(o)) => {
            e.len() == o.len() && e.iter().zip(o).all(|(ev, ov)| is_subset(ev, ov))
        }
        _ => expected == observed,
    }
}

/// JSON merge patch from `current` to `modified`, `None` when nothing changes
#[must_use]
pub fn three_way(original: Option<&Value>, modified: &Value, current: &Value) -> Option<Value> {
    let (Value::Object(modified), Value::Object(current)) = (modified, current) else {
        return (!is_subset(modified, current)).then(|| modified.clone());
    };

    let mut patch = Map::new();
    for (key, wanted) in modified {
        match current.get(key) {
            None => {
                patch.insert(key.clone(), wanted.clone());
            }
            Some(existing) => {
                let nested = original.and_then(|o| o.get(key));
                if let Some(change) = three_way(nested, wanted, existing) {
                    patch.insert(key.clone(), change);
                }
            }
        }
    }
    if let Some(Value::Object(original)) = original {
        for key in original.keys() {
            if !modified.contains_key(key) && current.contains_key(key) {
                patch.insert(key.clone(), Value::Null);
            }
        }
    }

    (!patch.is_empty()).then_some(Value::Object(patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use k8s_openapi::api::core::v1::{ConfigMap, Secret};
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("observability".to_string()),
                labels: Some(BTreeMap::from([("cluster".to_string(), "logs".to_string())])),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..ConfigMap::default()
        }
    }

    /// What the API server hands back after persisting `object`
    fn persisted(object: &ConfigMap, version: &str) -> ConfigMap {
        let mut stored = object.clone();
        stored.metadata.resource_version = Some(version.to_string());
        stored.metadata.uid = Some("a6a5b1e0-0000-4000-8000-00000000cafe".to_string());
        stored.metadata.creation_timestamp = None;
        stored
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert("injected-by-webhook".to_string(), "true".to_string());
        stored
    }

    #[test]
    fn test_absent_object_is_created_owned_and_stamped() {
        let kibana = fixtures::kibana();
        let result = diff(&kibana, Vec::new(), vec![config_map("logs-config-kb", &[("a", "1")])])
            .expect("diff");

        assert_eq!(result.create.len(), 1);
        let created = &result.create[0];
        let owner = &created.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.uid, "6b1c5b4e-0000-4000-8000-000000000001");
        assert_eq!(owner.controller, Some(true));
        assert!(created.annotations().contains_key(LAST_APPLIED_ANNOTATION));
    }

    #[test]
    fn test_diff_is_idempotent_after_apply() {
        let kibana = fixtures::kibana();
        let expected = vec![config_map("logs-config-kb", &[("a", "1")])];
        let first = diff(&kibana, Vec::new(), expected.clone()).expect("diff");
        let observed = vec![persisted(&first.create[0], "17")];

        let second = diff(&kibana, observed, expected).expect("diff");
        assert!(second.is_empty());
        assert_eq!(second.unchanged.len(), 1);
    }

    #[test]
    fn test_data_change_is_an_update_with_resource_version() {
        let kibana = fixtures::kibana();
        let first = diff(&kibana, Vec::new(), vec![config_map("c", &[("a", "1")])]).expect("diff");
        let observed = vec![persisted(&first.create[0], "42")];

        let result = diff(&kibana, observed, vec![config_map("c", &[("a", "2")])]).expect("diff");
        assert_eq!(result.update.len(), 1);
        let patch = &result.update[0].patch;
        assert_eq!(patch["data"], json!({"a": "2"}));
        assert_eq!(patch["metadata"]["resourceVersion"], json!("42"));
        assert!(patch["metadata"]["annotations"][LAST_APPLIED_ANNOTATION].is_string());
        // labels added by someone else are left alone
        assert!(patch["metadata"].get("labels").is_none());
    }

    #[test]
    fn test_removed_key_is_nulled() {
        let kibana = fixtures::kibana();
        let first = diff(
            &kibana,
            Vec::new(),
            vec![config_map("c", &[("a", "1"), ("b", "2")])],
        )
        .expect("diff");
        let observed = vec![persisted(&first.create[0], "3")];

        let result = diff(&kibana, observed, vec![config_map("c", &[("a", "1")])]).expect("diff");
        assert_eq!(result.update[0].patch["data"], json!({"b": null}));
    }

    #[test]
    fn test_leftover_observed_is_deleted() {
        let kibana = fixtures::kibana();
        let stale = config_map("logs-lb-kb", &[]);
        let result = diff(&kibana, vec![stale], Vec::new()).expect("diff");
        assert_eq!(result.delete.len(), 1);
        assert!(result.create.is_empty());
    }

    #[test]
    fn test_missing_uid_is_rejected() {
        let mut kibana = fixtures::kibana();
        kibana.metadata.uid = None;
        let result = diff(&kibana, Vec::new(), vec![config_map("c", &[])]);
        assert!(matches!(result, Err(PhaseError::Validation(_))));
    }

    #[test]
    fn test_subset_ignores_server_defaults() {
        let expected = json!({"spec": {"ports": [{"port": 5601, "name": "http"}]}});
        let observed = json!({"spec": {
            "clusterIP": "10.0.0.12",
            "ports": [{"port": 5601, "name": "http", "protocol": "TCP", "targetPort": 5601}]
        }});
        assert!(is_subset(&expected, &observed));
        assert_eq!(three_way(None, &expected, &observed), None);

        let extra_port = json!({"spec": {"ports": [{"port": 5601}, {"port": 9600}]}});
        assert!(!is_subset(&extra_port, &observed));
    }

    fn secret(name: &str, data: &[(&str, &[u8])]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("observability".to_string()),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        }
    }

    #[test]
    fn test_secret_payload_stays_out_of_baseline() {
        let kibana = fixtures::kibana();
        let expected = vec![secret(
            "logs-credential-kb",
            &[("username", b"kibana_system"), ("password", b"hunter2")],
        )];
        let first = diff(&kibana, Vec::new(), expected.clone()).expect("diff");
        let baseline = first.create[0].annotations()[LAST_APPLIED_ANNOTATION].clone();
        // base64 of the values
        assert!(!baseline.contains("aHVudGVyMg=="));
        assert!(!baseline.contains("a2liYW5hX3N5c3RlbQ=="));
        let parsed: Value = serde_json::from_str(&baseline).expect("json");
        assert!(parsed["data"]["password"]
            .as_str()
            .is_some_and(|v| v.starts_with("sha256:")));

        let mut stored = first.create[0].clone();
        stored.metadata.resource_version = Some("7".to_string());
        let second = diff(&kibana, vec![stored.clone()], expected).expect("diff");
        assert!(second.is_empty());

        // Rotation patches the value, a dropped key is still removed
        let rotated = vec![secret("logs-credential-kb", &[("password", b"s3cret")])];
        let third = diff(&kibana, vec![stored], rotated).expect("diff");
        let patch = &third.update[0].patch;
        assert_eq!(patch["data"]["password"], json!("czNjcmV0"));
        assert_eq!(patch["data"]["username"], Value::Null);
        assert!(!patch["metadata"]["annotations"][LAST_APPLIED_ANNOTATION]
            .as_str()
            .unwrap_or_default()
            .contains("czNjcmV0"));
    }

    #[test]
    fn test_config_map_baseline_is_verbatim() {
        let value = json!({"data": {"a": "1"}});
        assert_eq!(redact_payload("ConfigMap", &value), value);
    }

    #[test]
    fn test_normalize_strips_server_fields() {
        let value = json!({
            "metadata": {
                "name": "c",
                "resourceVersion": "1",
                "managedFields": [],
                "annotations": {LAST_APPLIED_ANNOTATION: "{}"}
            },
            "status": {"ready": true},
            "data": {"a": null, "b": "x"}
        });
        assert_eq!(
            normalize(value),
            json!({"metadata": {"name": "c"}, "data": {"b": "x"}})
        );
    }
}
