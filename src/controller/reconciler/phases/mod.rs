//! # Phase catalogue
//!
//! One [`KindReconciler`] per managed object family, registered in the order
//! later phases depend on: certificates, mirrored backing cluster material,
//! configuration, network exposure, policy, workload, then monitoring.
//!
//! | Phase | Kind | Objects |
//! |-------|------|---------|
//! | `Tls` | Secret | `<i>-pki-kb`, `<i>-tls-kb` |
//! | `CaElasticsearch` | Secret | `<i>-ca-es-kb` |
//! | `Credential` | Secret | `<i>-credential-kb` |
//! | `ConfigMap` | ConfigMap | `<i>-config-kb` |
//! | `Service` | Service | `<i>-kb` |
//! | `Ingress` | Ingress | `<i>-kb` |
//! | `Route` | Route | `<i>-kb` |
//! | `LoadBalancer` | Service | `<i>-lb-kb` |
//! | `NetworkPolicy` | NetworkPolicy | `<i>-allow-api-kb` |
//! | `PodDisruptionBudget` | PodDisruptionBudget | `<i>-kb` |
//! | `ServiceAccount` | ServiceAccount | `<i>-kb` |
//! | `RoleBinding` | RoleBinding | `<i>-kb` |
//! | `Deployment` | Deployment | `<i>-kb` |
//! | `PodMonitor` | PodMonitor | `<i>-kb` |
//! | `Metricbeat` | Metricbeat | `<i>-metricbeat-kb` |

mod config;
mod monitoring;
mod network;
mod policy;
mod secrets;
mod tls;
mod workload;

pub use config::ConfigMapReconciler;
pub use monitoring::{MetricbeatReconciler, PodMonitorReconciler};
pub use network::{
    IngressReconciler, LoadBalancerReconciler, NetworkPolicyReconciler, RouteReconciler,
    ServiceReconciler,
};
pub use policy::{PodDisruptionBudgetReconciler, RoleBindingReconciler, ServiceAccountReconciler};
pub use secrets::{CaElasticsearchReconciler, CredentialReconciler};
pub use tls::TlsReconciler;
pub use workload::{deployment_ready, DeploymentReconciler};

use crate::controller::reconciler::phase::{ManagedResource, Phase, PhaseAdapter};
use crate::controller::reconciler::types::PhaseError;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::Api;
use kube::Client;

/// Every phase, in execution order
#[must_use]
pub fn default_phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(PhaseAdapter(TlsReconciler)),
        Box::new(PhaseAdapter(CaElasticsearchReconciler)),
        Box::new(PhaseAdapter(CredentialReconciler)),
        Box::new(PhaseAdapter(ConfigMapReconciler)),
        Box::new(PhaseAdapter(ServiceReconciler)),
        Box::new(PhaseAdapter(IngressReconciler)),
        Box::new(PhaseAdapter(RouteReconciler)),
        Box::new(PhaseAdapter(LoadBalancerReconciler)),
        Box::new(PhaseAdapter(NetworkPolicyReconciler)),
        Box::new(PhaseAdapter(PodDisruptionBudgetReconciler)),
        Box::new(PhaseAdapter(ServiceAccountReconciler)),
        Box::new(PhaseAdapter(RoleBindingReconciler)),
        Box::new(PhaseAdapter(DeploymentReconciler)),
        Box::new(PhaseAdapter(PodMonitorReconciler)),
        Box::new(PhaseAdapter(MetricbeatReconciler)),
    ]
}

/// Fetch a collaborator object, a missing one is a dependency wait
pub(crate) async fn require<K: ManagedResource>(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<K, PhaseError> {
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    api.get_opt(name).await?.ok_or_else(|| {
        PhaseError::DependencyNotReady(format!("{} {namespace}/{name} not found", K::kind(&())))
    })
}

/// Value of `key` in a collaborator secret
pub(crate) fn require_key(secret: &Secret, key: &str) -> Result<ByteString, PhaseError> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .cloned()
        .ok_or_else(|| {
            PhaseError::DependencyNotReady(format!(
                "Secret {}/{} has no key {key}",
                secret.metadata.namespace.as_deref().unwrap_or_default(),
                secret.metadata.name.as_deref().unwrap_or_default(),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn test_phase_order() {
        let names: Vec<&str> = default_phases().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "Tls",
                "CaElasticsearch",
                "Credential",
                "ConfigMap",
                "Service",
                "Ingress",
                "Route",
                "LoadBalancer",
                "NetworkPolicy",
                "PodDisruptionBudget",
                "ServiceAccount",
                "RoleBinding",
                "Deployment",
                "PodMonitor",
                "Metricbeat",
            ]
        );
    }

    #[test]
    fn test_missing_secret_key_is_a_wait() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("es-credential-es".to_string()),
                namespace: Some("observability".to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                "elastic".to_string(),
                ByteString(b"pw".to_vec()),
            )])),
            ..Secret::default()
        };

        assert_eq!(
            require_key(&secret, "elastic").unwrap(),
            ByteString(b"pw".to_vec())
        );
        let error = require_key(&secret, "kibana_system").unwrap_err();
        assert!(matches!(error, PhaseError::DependencyNotReady(_)));
        assert_eq!(
            error.to_string(),
            "Secret observability/es-credential-es has no key kibana_system"
        );
    }
}
