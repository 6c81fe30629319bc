//! # Monitoring Policy

use crate::crd::ElasticsearchRef;
use k8s_openapi::api::core::v1::ResourceRequirements;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSpec {
    #[serde(default)]
    pub prometheus: Option<PrometheusSpec>,
    #[serde(default)]
    pub metricbeat: Option<MetricbeatSpec>,
}

impl MonitoringSpec {
    #[must_use]
    pub fn prometheus(&self) -> Option<&PrometheusSpec> {
        self.prometheus.as_ref().filter(|p| p.enabled)
    }

    #[must_use]
    pub fn metricbeat(&self) -> Option<&MetricbeatSpec> {
        self.metricbeat.as_ref().filter(|m| m.enabled)
    }
}

/// Prometheus scraping through a PodMonitor and the exporter plugin
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Exporter plugin archive URL
    /// Default: the release matching the Kibana version
    #[serde(default)]
    pub plugin_url: Option<String>,
    /// Scrape interval
    /// Default: 10s
    #[serde(default)]
    pub interval: Option<String>,
}

/// Metricbeat shipping Kibana stack monitoring to another cluster
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricbeatSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Monitoring cluster receiving the metrics
    #[serde(default)]
    pub elasticsearch_ref: Option<ElasticsearchRef>,
    /// Metricbeat collection period
    /// Default: 10s
    #[serde(default)]
    pub refresh_period: Option<String>,
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,
}
