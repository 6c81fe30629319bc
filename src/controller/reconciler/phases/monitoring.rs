//! Prometheus scraping and Metricbeat shipping.
//!
//! Both kinds belong to other operators. When their CRD is not installed the
//! phase observes nothing, so a disabled monitor never needs the CRD. Enabling
//! one without its CRD fails on create.

use crate::controller::builders::{
    build_metricbeats, build_pod_monitors, metricbeat_name, workload_name, Snapshot,
};
use crate::controller::reconciler::phase::KindReconciler;
use crate::controller::reconciler::types::PhaseError;
use crate::crd::{Kibana, Metricbeat, PodMonitor};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct PodMonitorReconciler;

#[async_trait]
impl KindReconciler for PodMonitorReconciler {
    type Kind = PodMonitor;

    fn name(&self) -> &'static str {
        "PodMonitor"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, _snapshot: &Snapshot) -> Result<Vec<PodMonitor>, PhaseError> {
        Ok(build_pod_monitors(kibana))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricbeatReconciler;

#[async_trait]
impl KindReconciler for MetricbeatReconciler {
    type Kind = Metricbeat;

    fn name(&self) -> &'static str {
        "Metricbeat"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![metricbeat_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, _snapshot: &Snapshot) -> Result<Vec<Metricbeat>, PhaseError> {
        Ok(build_metricbeats(kibana)?)
    }
}
