//! Service, exposure objects and the operator network policy.
//!
//! Ingress, route and load balancer are each produced only when enabled; a
//! disabled one leaves its previously created object to the delete branch of
//! the diff.

use crate::controller::builders::{
    build_ingresses, build_load_balancers, build_network_policies, build_routes, build_services,
    load_balancer_name, network_policy_name, workload_name, Snapshot,
};
use crate::controller::reconciler::phase::KindReconciler;
use crate::controller::reconciler::types::PhaseError;
use crate::crd::{Kibana, Route};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceReconciler;

#[async_trait]
impl KindReconciler for ServiceReconciler {
    type Kind = Service;

    fn name(&self) -> &'static str {
        "Service"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, _snapshot: &Snapshot) -> Result<Vec<Service>, PhaseError> {
        Ok(build_services(kibana))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngressReconciler;

#[async_trait]
impl KindReconciler for IngressReconciler {
    type Kind = Ingress;

    fn name(&self) -> &'static str {
        "Ingress"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, _snapshot: &Snapshot) -> Result<Vec<Ingress>, PhaseError> {
        Ok(build_ingresses(kibana)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteReconciler;

#[async_trait]
impl KindReconciler for RouteReconciler {
    type Kind = Route;

    fn name(&self) -> &'static str {
        "Route"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, snapshot: &Snapshot) -> Result<Vec<Route>, PhaseError> {
        Ok(build_routes(kibana, snapshot)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadBalancerReconciler;

#[async_trait]
impl KindReconciler for LoadBalancerReconciler {
    type Kind = Service;

    fn name(&self) -> &'static str {
        "LoadBalancer"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![load_balancer_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, _snapshot: &Snapshot) -> Result<Vec<Service>, PhaseError> {
        Ok(build_load_balancers(kibana))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkPolicyReconciler;

#[async_trait]
impl KindReconciler for NetworkPolicyReconciler {
    type Kind = NetworkPolicy;

    fn name(&self) -> &'static str {
        "NetworkPolicy"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![network_policy_name(kibana)]
    }

    fn build(
        &self,
        kibana: &Kibana,
        snapshot: &Snapshot,
    ) -> Result<Vec<NetworkPolicy>, PhaseError> {
        Ok(build_network_policies(kibana, &snapshot.operator_namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::{fixtures, BuildError};
    use crate::crd::IngressSpec;

    #[test]
    fn test_ingress_without_host_is_a_validation_error() {
        let mut kibana = fixtures::kibana();
        kibana.spec.endpoint.ingress = Some(IngressSpec {
            enabled: true,
            ..IngressSpec::default()
        });
        let error = IngressReconciler
            .build(&kibana, &Snapshot::new("kibana-operator-system"))
            .unwrap_err();
        assert!(error.is_validation());
        assert!(matches!(
            error,
            PhaseError::Build(BuildError::MissingHost { .. })
        ));
    }

    #[test]
    fn test_network_policy_only_across_namespaces() {
        let kibana = fixtures::kibana();
        let local = Snapshot::new("observability");
        let remote = Snapshot::new("kibana-operator-system");
        assert!(NetworkPolicyReconciler.build(&kibana, &local).unwrap().is_empty());
        assert_eq!(NetworkPolicyReconciler.build(&kibana, &remote).unwrap().len(), 1);
    }
}
