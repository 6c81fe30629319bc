//! Ingress exposure.

use super::{object_meta, workload_name, BuildError};
use crate::constants::KIBANA_PORT;
use crate::crd::Kibana;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};

/// `<instance>-kb`, when the ingress is enabled
///
/// Backend protocol follows the Kibana TLS setting so nginx style
/// controllers re-encrypt towards the pods.
pub fn build_ingresses(kibana: &Kibana) -> Result<Vec<Ingress>, BuildError> {
    let Some(spec) = kibana.spec.endpoint.ingress() else {
        return Ok(Vec::new());
    };
    let host = spec
        .host
        .clone()
        .filter(|h| !h.is_empty())
        .ok_or(BuildError::MissingHost { kind: "ingress" })?;

    let mut annotations = spec.annotations.clone();
    if kibana.tls_enabled() {
        annotations
            .entry("nginx.ingress.kubernetes.io/backend-protocol".to_string())
            .or_insert_with(|| "HTTPS".to_string());
    }

    let path = spec.path.clone().unwrap_or_else(|| "/".to_string());
    let rule = IngressRule {
        host: Some(host.clone()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some(path),
                path_type: "Prefix".to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: workload_name(kibana),
                        port: Some(ServiceBackendPort {
                            number: Some(KIBANA_PORT),
                            ..ServiceBackendPort::default()
                        }),
                    }),
                    ..IngressBackend::default()
                },
            }],
        }),
    };

    Ok(vec![Ingress {
        metadata: object_meta(kibana, workload_name(kibana), &spec.labels, &annotations),
        spec: Some(IngressSpec {
            ingress_class_name: spec.ingress_class_name.clone(),
            rules: Some(vec![rule]),
            tls: spec.secret_ref.as_ref().map(|secret| {
                vec![IngressTLS {
                    hosts: Some(vec![host.clone()]),
                    secret_name: Some(secret.name.clone()),
                }]
            }),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use crate::crd::IngressSpec as KibanaIngressSpec;

    #[test]
    fn test_missing_host_is_rejected() {
        let mut kibana = fixtures::kibana();
        kibana.spec.endpoint.ingress = Some(KibanaIngressSpec {
            enabled: true,
            ..KibanaIngressSpec::default()
        });
        assert_eq!(
            build_ingresses(&kibana),
            Err(BuildError::MissingHost { kind: "ingress" })
        );
    }

    #[test]
    fn test_ingress_routes_to_service() {
        let mut kibana = fixtures::kibana();
        kibana.spec.endpoint.ingress = Some(KibanaIngressSpec {
            enabled: true,
            host: Some("kb.example.com".to_string()),
            ..KibanaIngressSpec::default()
        });

        let ingresses = build_ingresses(&kibana).unwrap();
        let spec = ingresses[0].spec.as_ref().unwrap();
        let rule = &spec.rules.as_ref().unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("kb.example.com"));
        let backend = &rule.http.as_ref().unwrap().paths[0].backend;
        assert_eq!(backend.service.as_ref().unwrap().name, "logs-kb");
        assert!(spec.tls.is_none());
    }
}
