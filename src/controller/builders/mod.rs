//! # Builders
//!
//! Pure transforms from a Kibana instance plus a snapshot of the collaborator
//! objects it references into the objects the operator expects to exist.
//!
//! Builders never perform I/O and are deterministic: the same inputs always
//! produce byte-identical objects, which keeps diffs stable across reconciles.
//! Object names derive from the instance name plus a fixed per-kind suffix, so
//! observed objects are found by name without any index.
//!
//! Owner references are not set here; the diff stamps them before the first
//! comparison.

mod configmap;
mod deployment;
mod ingress;
mod monitoring;
mod network_policy;
mod pdb;
mod rbac;
mod route;
mod secret;
mod service;

pub use configmap::{build_config_maps, KIBANA_CONFIG_FILE};
pub use deployment::build_deployments;
pub use ingress::build_ingresses;
pub use monitoring::{build_metricbeats, build_pod_monitors, PROMETHEUS_PLUGIN_URL};
pub use network_policy::build_network_policies;
pub use pdb::build_pod_disruption_budgets;
pub use rbac::{build_role_bindings, build_service_accounts};
pub use route::build_routes;
pub use secret::{
    build_ca_elasticsearch_secrets, build_credential_secrets, build_pki_secrets,
    ELASTICSEARCH_CA_KEY, PASSWORD_KEY, USERNAME_KEY,
};
pub use service::{build_load_balancers, build_services};

use crate::constants::{CLUSTER_LABEL, DOMAIN, ELASTICSEARCH_PORT, KIBANA_PORT, NAME_SUFFIX};
use crate::controller::pki::PkiMaterial;
use crate::crd::{Elasticsearch, Kibana};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use thiserror::Error;

/// Builder validation errors
///
/// These are never retried blindly; they require a spec change.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("{kind} is enabled but no host is set")]
    MissingHost { kind: &'static str },

    #[error("invalid {file}: {reason}")]
    InvalidConfig { file: String, reason: String },

    #[error("metricbeat monitoring is enabled without an elasticsearchRef")]
    MissingMonitoringTarget,
}

/// Collaborator state the builders read
///
/// Filled by the phases as they run. Later phases consume what earlier phases
/// recorded (certificates, mirrored secrets, checksums).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Namespace the operator runs in
    pub operator_namespace: String,
    /// Managed backing cluster, when referenced and observed
    pub elasticsearch: Option<Elasticsearch>,
    /// `ca.crt` of the backing cluster API certificate secret
    pub elasticsearch_ca: Option<ByteString>,
    /// `kibana_system` password of the backing cluster
    pub elasticsearch_password: Option<ByteString>,
    /// Self-signed CA and leaf of this instance
    pub pki: Option<PkiMaterial>,
    /// `ca.crt` of the user supplied certificate secret
    pub external_ca: Option<String>,
    /// Pod template checksum annotations (annotation key → sha256)
    pub checksums: BTreeMap<String, String>,
}

impl Snapshot {
    #[must_use]
    pub fn new(operator_namespace: impl Into<String>) -> Self {
        Self {
            operator_namespace: operator_namespace.into(),
            ..Self::default()
        }
    }

    /// Whether Kibana talks to a managed backing cluster over TLS
    #[must_use]
    pub fn elasticsearch_tls(&self) -> bool {
        self.elasticsearch.as_ref().is_some_and(Elasticsearch::tls_enabled)
    }
}

/// `<instance>-kb`, shared by service, ingress, deployment, PDB and RBAC objects
#[must_use]
pub fn workload_name(kibana: &Kibana) -> String {
    format!("{}-{NAME_SUFFIX}", kibana.instance_name())
}

/// `<instance>-<part>-kb`
#[must_use]
pub fn object_name(kibana: &Kibana, part: &str) -> String {
    format!("{}-{part}-{NAME_SUFFIX}", kibana.instance_name())
}

#[must_use]
pub fn pki_secret_name(kibana: &Kibana) -> String {
    object_name(kibana, "pki")
}

#[must_use]
pub fn tls_secret_name(kibana: &Kibana) -> String {
    object_name(kibana, "tls")
}

#[must_use]
pub fn ca_elasticsearch_secret_name(kibana: &Kibana) -> String {
    object_name(kibana, "ca-es")
}

#[must_use]
pub fn credential_secret_name(kibana: &Kibana) -> String {
    object_name(kibana, "credential")
}

#[must_use]
pub fn config_map_name(kibana: &Kibana) -> String {
    object_name(kibana, "config")
}

#[must_use]
pub fn load_balancer_name(kibana: &Kibana) -> String {
    object_name(kibana, "lb")
}

#[must_use]
pub fn network_policy_name(kibana: &Kibana) -> String {
    object_name(kibana, "allow-api")
}

#[must_use]
pub fn metricbeat_name(kibana: &Kibana) -> String {
    object_name(kibana, "metricbeat")
}

/// Name of the secret the Kibana container serves TLS from
#[must_use]
pub fn serving_secret_name(kibana: &Kibana) -> Option<String> {
    if !kibana.tls_enabled() {
        return None;
    }
    Some(
        kibana
            .spec
            .tls
            .certificate_secret_ref
            .as_ref()
            .map_or_else(|| tls_secret_name(kibana), |r| r.name.clone()),
    )
}

/// Managed backing cluster `(name, namespace)`
#[must_use]
pub fn managed_elasticsearch(kibana: &Kibana) -> Option<(String, String)> {
    let managed = kibana.spec.elasticsearch_ref.as_ref()?.managed.as_ref()?;
    let namespace = managed
        .namespace
        .clone()
        .unwrap_or_else(|| kibana.instance_namespace().to_string());
    Some((managed.name.clone(), namespace))
}

/// In-cluster URL of a managed backing cluster
#[must_use]
pub fn elasticsearch_url(name: &str, namespace: &str, tls: bool) -> String {
    let scheme = if tls { "https" } else { "http" };
    format!("{scheme}://{name}-es.{namespace}.svc:{ELASTICSEARCH_PORT}")
}

/// API certificate secret of a managed backing cluster
#[must_use]
pub fn elasticsearch_tls_secret_name(name: &str) -> String {
    format!("{name}-tls-api-es")
}

/// Credential secret of a managed backing cluster
#[must_use]
pub fn elasticsearch_credential_secret_name(name: &str) -> String {
    format!("{name}-credential-es")
}

/// Externally reachable URL of the instance
#[must_use]
pub fn kibana_url(kibana: &Kibana) -> String {
    let scheme = if kibana.tls_enabled() { "https" } else { "http" };
    if let Some(ingress) = kibana.spec.endpoint.ingress() {
        if let Some(host) = &ingress.host {
            let scheme = if ingress.secret_ref.is_some() { "https" } else { "http" };
            let path = ingress.path.as_deref().unwrap_or("/");
            return format!("{scheme}://{host}{path}");
        }
    }
    if let Some(host) = kibana.spec.endpoint.route().and_then(|r| r.host.as_ref()) {
        return format!("https://{host}");
    }
    format!(
        "{scheme}://{}.{}.svc:{KIBANA_PORT}",
        workload_name(kibana),
        kibana.instance_namespace()
    )
}

/// Labels used by every selector (workload, PDB, network policy, monitor)
#[must_use]
pub fn selector_labels(kibana: &Kibana) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_LABEL.to_string(), kibana.instance_name().to_string()),
        (DOMAIN.to_string(), "true".to_string()),
    ])
}

/// Instance labels, then `extra`, then the selector labels
#[must_use]
pub fn labels(kibana: &Kibana, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut labels = kibana.metadata.labels.clone().unwrap_or_default();
    labels.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    labels.extend(selector_labels(kibana));
    labels
}

/// Domain marker plus `extra`
#[must_use]
pub fn annotations(extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::from([(DOMAIN.to_string(), "true".to_string())]);
    annotations.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    annotations
}

/// Metadata of a managed object living next to the instance
#[must_use]
pub fn object_meta(
    kibana: &Kibana,
    name: String,
    extra_labels: &BTreeMap<String, String>,
    extra_annotations: &BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(kibana.instance_namespace().to_string()),
        labels: Some(labels(kibana, extra_labels)),
        annotations: Some(annotations(extra_annotations)),
        ..ObjectMeta::default()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::crd::{ElasticsearchRef, Kibana, KibanaSpec, ManagedElasticsearchRef};

    /// Minimal persisted instance: TLS on, managed backing cluster `es`
    pub fn kibana() -> Kibana {
        let mut kibana = Kibana::new(
            "logs",
            KibanaSpec {
                version: "8.15.0".to_string(),
                elasticsearch_ref: Some(ElasticsearchRef {
                    managed: Some(ManagedElasticsearchRef {
                        name: "es".to_string(),
                        namespace: None,
                    }),
                    ..ElasticsearchRef::default()
                }),
                ..KibanaSpec::default()
            },
        );
        kibana.metadata.namespace = Some("observability".to_string());
        kibana.metadata.uid = Some("6b1c5b4e-0000-4000-8000-000000000001".to_string());
        kibana
    }
}
