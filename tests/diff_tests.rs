//! # Diff and Checksum Tests
//!
//! Convergence behaviour across consecutive reconciles, without a cluster:
//! objects "applied" by one pass are fed back as the observed state of the
//! next one.

mod common;

use common::{config_map, kibana, local_snapshot};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kibana_operator::controller::builders::{
    build_config_maps, build_deployments, build_services, Snapshot,
};
use kibana_operator::controller::checksum::{config_map_annotation, config_map_checksum};
use kibana_operator::controller::reconciler::diff;
use kibana_operator::crd::Kibana;

/// What the API server would hand back after creating `objects`
fn persisted<K: kube::Resource>(mut objects: Vec<K>) -> Vec<K> {
    for (i, object) in objects.iter_mut().enumerate() {
        let meta = object.meta_mut();
        meta.resource_version = Some(format!("{}", 100 + i));
        meta.uid = Some(format!("uid-{i}"));
        meta.generation = Some(1);
    }
    objects
}

fn applied_deployments(kibana: &Kibana, snapshot: &Snapshot) -> Vec<Deployment> {
    let first = diff(kibana, Vec::new(), build_deployments(kibana, snapshot)).unwrap();
    assert_eq!(first.create.len(), 1);
    persisted(first.create)
}

#[test]
fn test_second_pass_on_applied_objects_is_a_no_op() {
    let kibana = kibana();
    let snapshot = local_snapshot();

    let observed = applied_deployments(&kibana, &snapshot);
    let second = diff(&kibana, observed, build_deployments(&kibana, &snapshot)).unwrap();
    assert!(second.is_empty());
    assert_eq!(second.unchanged.len(), 1);

    let first = diff(&kibana, Vec::new(), build_config_maps(&kibana).unwrap()).unwrap();
    let observed = persisted(first.create);
    let second = diff(&kibana, observed, build_config_maps(&kibana).unwrap()).unwrap();
    assert!(second.is_empty());
}

#[test]
fn test_server_defaulted_fields_do_not_produce_patches() {
    let kibana = kibana();
    let first = diff(&kibana, Vec::new(), build_services(&kibana)).unwrap();
    let mut observed: Vec<Service> = persisted(first.create);
    if let Some(spec) = observed[0].spec.as_mut() {
        spec.cluster_ip = Some("10.96.12.7".to_string());
        spec.cluster_ips = Some(vec!["10.96.12.7".to_string()]);
        spec.session_affinity = Some("None".to_string());
    }

    let second = diff(&kibana, observed, build_services(&kibana)).unwrap();
    assert!(second.is_empty());
}

#[test]
fn test_referenced_config_map_change_rolls_the_workload() {
    let kibana = kibana();
    let annotation = config_map_annotation("kibana-extra");

    let before = config_map("kibana-extra", &[("feature.flags", "a=1")]);
    let mut snapshot = local_snapshot();
    snapshot
        .checksums
        .insert(annotation.clone(), config_map_checksum(&before));
    let observed = applied_deployments(&kibana, &snapshot);

    let after = config_map("kibana-extra", &[("feature.flags", "a=2")]);
    let mut snapshot = local_snapshot();
    snapshot
        .checksums
        .insert(annotation.clone(), config_map_checksum(&after));
    let second = diff(&kibana, observed, build_deployments(&kibana, &snapshot)).unwrap();

    assert!(second.create.is_empty());
    assert!(second.delete.is_empty());
    assert_eq!(second.update.len(), 1);

    let patched = &second.update[0].patch["spec"]["template"]["metadata"]["annotations"]
        [annotation.as_str()];
    assert_eq!(patched.as_str(), Some(config_map_checksum(&after).as_str()));
    // Carried so the write fails on a concurrent change
    assert_eq!(
        second.update[0].patch["metadata"]["resourceVersion"].as_str(),
        Some("100")
    );
}

#[test]
fn test_checksum_follows_data_only() {
    let original = config_map("kibana-extra", &[("a", "1"), ("b", "2")]);

    let mut relabelled = original.clone();
    relabelled.metadata.labels = Some([("team".to_string(), "search".to_string())].into());
    relabelled.metadata.resource_version = Some("42".to_string());
    assert_eq!(config_map_checksum(&original), config_map_checksum(&relabelled));

    let changed = config_map("kibana-extra", &[("a", "1"), ("b", "3")]);
    assert_ne!(config_map_checksum(&original), config_map_checksum(&changed));

    let renamed_key = config_map("kibana-extra", &[("a", "1"), ("c", "2")]);
    assert_ne!(config_map_checksum(&original), config_map_checksum(&renamed_key));
}

#[test]
fn test_dropped_object_is_deleted() {
    let mut kibana = kibana();
    kibana.spec.deployment.replicas = 3;
    let first = diff(
        &kibana,
        Vec::new(),
        kibana_operator::controller::builders::build_pod_disruption_budgets(&kibana),
    )
    .unwrap();
    let observed = persisted(first.create);

    kibana.spec.deployment.replicas = 1;
    let second = diff(
        &kibana,
        observed,
        kibana_operator::controller::builders::build_pod_disruption_budgets(&kibana),
    )
    .unwrap();
    assert_eq!(second.delete.len(), 1);
    assert!(second.create.is_empty());
}
