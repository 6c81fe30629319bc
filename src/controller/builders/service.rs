//! Cluster service and optional load balancer.

use super::{load_balancer_name, object_meta, selector_labels, workload_name};
use crate::constants::KIBANA_PORT;
use crate::crd::Kibana;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

fn http_port() -> ServicePort {
    ServicePort {
        name: Some("http".to_string()),
        port: KIBANA_PORT,
        protocol: Some("TCP".to_string()),
        target_port: Some(IntOrString::Int(KIBANA_PORT)),
        ..ServicePort::default()
    }
}

/// `<instance>-kb`, always present
#[must_use]
pub fn build_services(kibana: &Kibana) -> Vec<Service> {
    vec![Service {
        metadata: object_meta(
            kibana,
            workload_name(kibana),
            &BTreeMap::new(),
            &BTreeMap::new(),
        ),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(kibana)),
            ports: Some(vec![http_port()]),
            session_affinity: Some("None".to_string()),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }]
}

/// `<instance>-lb-kb`, when the load balancer is enabled
#[must_use]
pub fn build_load_balancers(kibana: &Kibana) -> Vec<Service> {
    let Some(lb) = kibana.spec.endpoint.load_balancer() else {
        return Vec::new();
    };

    vec![Service {
        metadata: object_meta(
            kibana,
            load_balancer_name(kibana),
            &BTreeMap::new(),
            &lb.annotations,
        ),
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            selector: Some(selector_labels(kibana)),
            ports: Some(vec![http_port()]),
            load_balancer_source_ranges: (!lb.source_ranges.is_empty())
                .then(|| lb.source_ranges.clone()),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }]
}
