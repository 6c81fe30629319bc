//! # Kibana Spec
//!
//! Main CRD specification types and default values.

use crate::crd::{
    DeploymentSpec, ElasticsearchRef, EndpointSpec, KibanaStatus, MonitoringSpec, TlsSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kibana Custom Resource Definition
///
/// One Kibana resource describes a complete Kibana deployment bound to a
/// backing Elasticsearch cluster. The operator derives every dependent object
/// (workload, network, secrets, policy, monitoring) from it.
///
/// # Example
///
/// ```yaml
/// apiVersion: kibana.k8s.webcenter.fr/v1
/// kind: Kibana
/// metadata:
///   name: logs
///   namespace: observability
/// spec:
///   version: 8.15.0
///   elasticsearchRef:
///     managed:
///       name: logs
///   endpoint:
///     ingress:
///       enabled: true
///       host: kibana.example.com
///   deployment:
///     replicas: 2
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Kibana",
    group = "kibana.k8s.webcenter.fr",
    version = "v1",
    namespaced,
    status = "KibanaStatus",
    derive = "PartialEq",
    shortname = "kb",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"URL", "type":"string", "jsonPath":".status.url"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Error", "type":"boolean", "jsonPath":".status.isOnError"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KibanaSpec {
    /// Container image without tag
    /// Default: docker.elastic.co/kibana/kibana
    #[serde(default)]
    pub image: Option<String>,
    /// Kibana version, used as image tag
    pub version: String,
    /// Backing Elasticsearch cluster, either managed by the Elasticsearch operator or external
    #[serde(default)]
    pub elasticsearch_ref: Option<ElasticsearchRef>,
    /// TLS policy of the Kibana HTTP endpoint
    #[serde(default)]
    pub tls: TlsSpec,
    /// Secret whose keys are loaded into the Kibana keystore
    #[serde(default)]
    pub keystore_secret_ref: Option<SecretRef>,
    /// Extra configuration files (file name → content)
    /// `kibana.yml` is merged over the operator defaults, other files are mounted as-is
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Exposure policy (ingress, route, load balancer)
    #[serde(default)]
    pub endpoint: EndpointSpec,
    /// Monitoring policy (Prometheus pod monitor, Metricbeat shipper)
    #[serde(default)]
    pub monitoring: MonitoringSpec,
    /// Deployment policy
    #[serde(default)]
    pub deployment: DeploymentSpec,
}

impl Kibana {
    /// Instance name (empty for objects not yet persisted)
    #[must_use]
    pub fn instance_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Instance namespace
    #[must_use]
    pub fn instance_namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// `namespace/name` identity used by the dependency index
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}/{}", self.instance_namespace(), self.instance_name())
    }

    /// Full image reference
    #[must_use]
    pub fn image(&self) -> String {
        let image = self
            .spec
            .image
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_IMAGE);
        format!("{image}:{}", self.spec.version)
    }

    /// Whether Kibana serves HTTPS
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.spec.tls.is_enabled()
    }

    /// Whether the operator issues the certificate itself
    #[must_use]
    pub fn self_signed_tls(&self) -> bool {
        self.tls_enabled() && self.spec.tls.certificate_secret_ref.is_none()
    }
}

/// Reference to a Secret or ConfigMap in the instance namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
}

