//! # Deployment Policy
//!
//! Pod level settings of the Kibana workload.

use k8s_openapi::api::core::v1::{Affinity, EnvFromSource, EnvVar, ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Number of Kibana pods
    /// Default: 1
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,
    /// Extra environment variables, merged by name over the operator's own
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub env_from: Vec<EnvFromSource>,
    /// Pod affinity; defaults to a preferred anti-affinity on the node host name
    #[serde(default)]
    pub affinity: Option<Affinity>,
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    /// Plugins installed by an init container (names or archive URLs)
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub pod_disruption_budget: Option<PodDisruptionBudgetSpec>,
    /// Dedicated service account for the Kibana pods
    #[serde(default)]
    pub service_account: Option<ServiceAccountSpec>,
    #[serde(default)]
    pub pod_template_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
}

impl Default for DeploymentSpec {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            resources: None,
            env: Vec::new(),
            env_from: Vec::new(),
            affinity: None,
            tolerations: Vec::new(),
            node_selector: BTreeMap::new(),
            plugins: Vec::new(),
            pod_disruption_budget: None,
            service_account: None,
            pod_template_labels: BTreeMap::new(),
            pod_template_annotations: BTreeMap::new(),
        }
    }
}

fn default_replicas() -> i32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PodDisruptionBudgetSpec {
    #[serde(default)]
    pub min_available: Option<IntOrString>,
    #[serde(default)]
    pub max_unavailable: Option<IntOrString>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSpec {
    /// Role bound to the service account in the instance namespace
    #[serde(default)]
    pub role_ref: Option<RoleRefSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleRefSpec {
    /// `ClusterRole` or `Role`
    /// Default: ClusterRole
    #[serde(default = "default_role_kind")]
    pub kind: String,
    pub name: String,
}

fn default_role_kind() -> String {
    "ClusterRole".to_string()
}
