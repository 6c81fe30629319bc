//! Network policy admitting the operator to the Kibana API.

use super::{network_policy_name, object_meta, selector_labels};
use crate::constants::KIBANA_PORT;
use crate::crd::Kibana;
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// `<instance>-allow-api-kb`, when the instance lives outside the operator namespace
#[must_use]
pub fn build_network_policies(kibana: &Kibana, operator_namespace: &str) -> Vec<NetworkPolicy> {
    if kibana.instance_namespace() == operator_namespace {
        return Vec::new();
    }

    let peer = NetworkPolicyPeer {
        namespace_selector: Some(LabelSelector {
            match_labels: Some(BTreeMap::from([(
                "kubernetes.io/metadata.name".to_string(),
                operator_namespace.to_string(),
            )])),
            ..LabelSelector::default()
        }),
        ..NetworkPolicyPeer::default()
    };

    vec![NetworkPolicy {
        metadata: object_meta(
            kibana,
            network_policy_name(kibana),
            &BTreeMap::new(),
            &BTreeMap::new(),
        ),
        spec: Some(NetworkPolicySpec {
            pod_selector: Some(LabelSelector {
                match_labels: Some(selector_labels(kibana)),
                ..LabelSelector::default()
            }),
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![peer]),
                ports: Some(vec![NetworkPolicyPort {
                    port: Some(IntOrString::Int(KIBANA_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..NetworkPolicyPort::default()
                }]),
            }]),
            policy_types: Some(vec!["Ingress".to_string()]),
            ..NetworkPolicySpec::default()
        }),
    }]
}
