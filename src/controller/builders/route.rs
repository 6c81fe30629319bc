//! OpenShift route exposure.

use super::{object_meta, workload_name, BuildError, Snapshot};
use crate::crd::{
    Kibana, Route, RoutePort, RouteResourceSpec, RouteTargetReference, RouteTlsConfig,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// `<instance>-kb`, when the route is enabled
///
/// TLS terminates at the router; with Kibana TLS on the router re-encrypts and
/// trusts the instance CA (self-signed or from the supplied certificate).
pub fn build_routes(kibana: &Kibana, snapshot: &Snapshot) -> Result<Vec<Route>, BuildError> {
    let Some(spec) = kibana.spec.endpoint.route() else {
        return Ok(Vec::new());
    };
    let host = spec
        .host
        .clone()
        .filter(|h| !h.is_empty())
        .ok_or(BuildError::MissingHost { kind: "route" })?;

    let tls = if kibana.tls_enabled() {
        RouteTlsConfig {
            termination: "reencrypt".to_string(),
            destination_ca_certificate: snapshot
                .pki
                .as_ref()
                .map(|pki| pki.ca_cert.clone())
                .or_else(|| snapshot.external_ca.clone()),
            insecure_edge_termination_policy: Some("Redirect".to_string()),
        }
    } else {
        RouteTlsConfig {
            termination: "edge".to_string(),
            destination_ca_certificate: None,
            insecure_edge_termination_policy: Some("Redirect".to_string()),
        }
    };

    let mut route = Route::new(
        &workload_name(kibana),
        RouteResourceSpec {
            host,
            path: None,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: workload_name(kibana),
            },
            port: Some(RoutePort {
                target_port: IntOrString::String("http".to_string()),
            }),
            tls: Some(tls),
        },
    );
    route.metadata = object_meta(kibana, workload_name(kibana), &spec.labels, &spec.annotations);
    Ok(vec![route])
}
