//! # Backing Cluster Reference
//!
//! Identity reference to the Elasticsearch cluster Kibana talks to. This is a
//! plain reference: the backing cluster's lifecycle is independent of Kibana.

use crate::crd::SecretRef;
use serde::{Deserialize, Serialize};

/// Backing cluster reference
///
/// Exactly one of `managed` or `external` must be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchRef {
    /// Cluster managed by the Elasticsearch operator
    #[serde(default)]
    pub managed: Option<ManagedElasticsearchRef>,
    /// Cluster outside the operator's control
    #[serde(default)]
    pub external: Option<ExternalElasticsearchRef>,
    /// Credentials for an external cluster (`username` and `password` keys)
    #[serde(default)]
    pub secret_ref: Option<SecretRef>,
    /// CA of an external cluster (`ca.crt` key)
    #[serde(default)]
    pub ca_secret_ref: Option<SecretRef>,
}

impl ElasticsearchRef {
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.managed.is_some()
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }
}

/// Managed backing cluster
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedElasticsearchRef {
    /// Elasticsearch resource name
    pub name: String,
    /// Elasticsearch resource namespace
    /// Default: the Kibana namespace
    #[serde(default)]
    pub namespace: Option<String>,
}

/// External backing cluster
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalElasticsearchRef {
    /// Base URLs of the cluster
    pub addresses: Vec<String>,
}
