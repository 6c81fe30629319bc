//! Disruption budget and pod identity.

use crate::controller::builders::{
    build_pod_disruption_budgets, build_role_bindings, build_service_accounts, workload_name,
    Snapshot,
};
use crate::controller::reconciler::phase::KindReconciler;
use crate::controller::reconciler::types::PhaseError;
use crate::crd::Kibana;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::RoleBinding;

#[derive(Debug, Clone, Copy, Default)]
pub struct PodDisruptionBudgetReconciler;

#[async_trait]
impl KindReconciler for PodDisruptionBudgetReconciler {
    type Kind = PodDisruptionBudget;

    fn name(&self) -> &'static str {
        "PodDisruptionBudget"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    fn build(
        &self,
        kibana: &Kibana,
        _snapshot: &Snapshot,
    ) -> Result<Vec<PodDisruptionBudget>, PhaseError> {
        Ok(build_pod_disruption_budgets(kibana))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccountReconciler;

#[async_trait]
impl KindReconciler for ServiceAccountReconciler {
    type Kind = ServiceAccount;

    fn name(&self) -> &'static str {
        "ServiceAccount"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    fn build(
        &self,
        kibana: &Kibana,
        _snapshot: &Snapshot,
    ) -> Result<Vec<ServiceAccount>, PhaseError> {
        Ok(build_service_accounts(kibana))
    }
}

/// `roleRef` changes are recreated by the apply fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleBindingReconciler;

#[async_trait]
impl KindReconciler for RoleBindingReconciler {
    type Kind = RoleBinding;

    fn name(&self) -> &'static str {
        "RoleBinding"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, _snapshot: &Snapshot) -> Result<Vec<RoleBinding>, PhaseError> {
        Ok(build_role_bindings(kibana))
    }
}
