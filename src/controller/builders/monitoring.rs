//! Prometheus pod monitor and Metricbeat shipper.

use super::{metricbeat_name, object_meta, selector_labels, workload_name, BuildError};
use crate::constants::KIBANA_PORT;
use crate::crd::{
    Kibana, Metricbeat, MetricbeatDeploymentSpec, MetricbeatResourceSpec, PodMetricsEndpoint,
    PodMonitor, PodMonitorSpec, SafeTlsConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// Release archive of the Prometheus exporter plugin; `{version}` is the Kibana version
pub const PROMETHEUS_PLUGIN_URL: &str = "https://github.com/pjhampton/kibana-prometheus-exporter/releases/download/{version}/kibanaPrometheusExporter-{version}.zip";

const DEFAULT_INTERVAL: &str = "10s";

/// `<instance>-kb`, when Prometheus monitoring is enabled
#[must_use]
pub fn build_pod_monitors(kibana: &Kibana) -> Vec<PodMonitor> {
    let Some(prometheus) = kibana.spec.monitoring.prometheus() else {
        return Vec::new();
    };

    let tls = kibana.tls_enabled();
    let mut monitor = PodMonitor::new(
        &workload_name(kibana),
        PodMonitorSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels(kibana)),
                ..LabelSelector::default()
            },
            pod_metrics_endpoints: vec![PodMetricsEndpoint {
                port: Some("http".to_string()),
                path: Some("/_prometheus/metrics".to_string()),
                interval: Some(
                    prometheus
                        .interval
                        .clone()
                        .unwrap_or_else(|| DEFAULT_INTERVAL.to_string()),
                ),
                scheme: Some(if tls { "https" } else { "http" }.to_string()),
                tls_config: tls.then(|| SafeTlsConfig {
                    insecure_skip_verify: true,
                }),
            }],
        },
    );
    monitor.metadata = object_meta(
        kibana,
        workload_name(kibana),
        &BTreeMap::new(),
        &BTreeMap::new(),
    );
    vec![monitor]
}

/// `<instance>-metricbeat-kb`, when Metricbeat monitoring is enabled
pub fn build_metricbeats(kibana: &Kibana) -> Result<Vec<Metricbeat>, BuildError> {
    let Some(metricbeat) = kibana.spec.monitoring.metricbeat() else {
        return Ok(Vec::new());
    };
    let target = metricbeat
        .elasticsearch_ref
        .clone()
        .ok_or(BuildError::MissingMonitoringTarget)?;

    let scheme = if kibana.tls_enabled() { "https" } else { "http" };
    let period = metricbeat.refresh_period.as_deref().unwrap_or(DEFAULT_INTERVAL);
    let module = format!(
        "- module: kibana\n  xpack.enabled: true\n  period: {period}\n  hosts: [\"{scheme}://{}.{}.svc:{KIBANA_PORT}\"]\n  username: ${{SOURCE_METRICBEAT_USERNAME}}\n  password: ${{SOURCE_METRICBEAT_PASSWORD}}\n  ssl.verification_mode: none\n",
        workload_name(kibana),
        kibana.instance_namespace(),
    );

    let mut beat = Metricbeat::new(
        &metricbeat_name(kibana),
        MetricbeatResourceSpec {
            version: kibana.spec.version.clone(),
            elasticsearch_ref: target,
            module: BTreeMap::from([("kibana-xpack.yml".to_string(), module)]),
            deployment: MetricbeatDeploymentSpec {
                replicas: 1,
                resources: metricbeat.resources.clone(),
            },
        },
    );
    beat.metadata = object_meta(
        kibana,
        metricbeat_name(kibana),
        &BTreeMap::new(),
        &BTreeMap::new(),
    );
    Ok(vec![beat])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use crate::crd::{ElasticsearchRef, ManagedElasticsearchRef, MetricbeatSpec, PrometheusSpec};

    #[test]
    fn test_pod_monitor_scrapes_https_when_tls() {
        let mut kibana = fixtures::kibana();
        kibana.spec.monitoring.prometheus = Some(PrometheusSpec {
            enabled: true,
            ..PrometheusSpec::default()
        });

        let monitors = build_pod_monitors(&kibana);
        let endpoint = &monitors[0].spec.pod_metrics_endpoints[0];
        assert_eq!(endpoint.scheme.as_deref(), Some("https"));
        assert_eq!(endpoint.interval.as_deref(), Some("10s"));
    }

    #[test]
    fn test_metricbeat_targets_monitoring_cluster() {
        let mut kibana = fixtures::kibana();
        kibana.spec.monitoring.metricbeat = Some(MetricbeatSpec {
            enabled: true,
            elasticsearch_ref: Some(ElasticsearchRef {
                managed: Some(ManagedElasticsearchRef {
                    name: "monitoring".to_string(),
                    namespace: Some("monitoring".to_string()),
                }),
                ..ElasticsearchRef::default()
            }),
            ..MetricbeatSpec::default()
        });

        let beats = build_metricbeats(&kibana).unwrap();
        assert_eq!(beats[0].metadata.name.as_deref(), Some("logs-metricbeat-kb"));
        let module = beats[0].spec.module.get("kibana-xpack.yml").unwrap();
        assert!(module.contains("https://logs-kb.observability.svc:5601"));
    }

    #[test]
    fn test_metricbeat_without_target_is_rejected() {
        let mut kibana = fixtures::kibana();
        kibana.spec.monitoring.metricbeat = Some(MetricbeatSpec {
            enabled: true,
            ..MetricbeatSpec::default()
        });
        assert_eq!(
            build_metricbeats(&kibana),
            Err(BuildError::MissingMonitoringTarget)
        );
    }
}
