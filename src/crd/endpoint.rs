//! # Exposure Policy
//!
//! Ingress, OpenShift route and load balancer settings. Each one can be
//! enabled independently.

use crate::crd::SecretRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    #[serde(default)]
    pub ingress: Option<IngressSpec>,
    #[serde(default)]
    pub route: Option<RouteSpec>,
    #[serde(default)]
    pub load_balancer: Option<LoadBalancerSpec>,
}

impl EndpointSpec {
    /// Enabled ingress settings
    #[must_use]
    pub fn ingress(&self) -> Option<&IngressSpec> {
        self.ingress.as_ref().filter(|i| i.enabled)
    }

    /// Enabled route settings
    #[must_use]
    pub fn route(&self) -> Option<&RouteSpec> {
        self.route.as_ref().filter(|r| r.enabled)
    }

    /// Enabled load balancer settings
    #[must_use]
    pub fn load_balancer(&self) -> Option<&LoadBalancerSpec> {
        self.load_balancer.as_ref().filter(|l| l.enabled)
    }
}

/// Ingress settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Public host name, required when enabled
    #[serde(default)]
    pub host: Option<String>,
    /// TLS secret served by the ingress controller
    #[serde(default)]
    pub secret_ref: Option<SecretRef>,
    #[serde(default)]
    pub ingress_class_name: Option<String>,
    /// Path prefix
    /// Default: /
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// OpenShift route settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Public host name, required when enabled
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Load balancer service settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Source CIDRs allowed through the load balancer
    #[serde(default)]
    pub source_ranges: Vec<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}
