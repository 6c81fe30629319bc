//! Pod disruption budget.

use super::{object_meta, selector_labels, workload_name};
use crate::crd::Kibana;
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// `<instance>-kb`
///
/// Produced for an explicit budget, or by default with `maxUnavailable: 1`
/// when more than one replica runs.
#[must_use]
pub fn build_pod_disruption_budgets(kibana: &Kibana) -> Vec<PodDisruptionBudget> {
    let deployment = &kibana.spec.deployment;
    let (min_available, max_unavailable) = match &deployment.pod_disruption_budget {
        Some(pdb) => (pdb.min_available.clone(), pdb.max_unavailable.clone()),
        None if deployment.replicas > 1 => (None, Some(IntOrString::Int(1))),
        None => return Vec::new(),
    };

    vec![PodDisruptionBudget {
        metadata: object_meta(
            kibana,
            workload_name(kibana),
            &BTreeMap::new(),
            &BTreeMap::new(),
        ),
        spec: Some(PodDisruptionBudgetSpec {
            min_available,
            max_unavailable,
            selector: Some(LabelSelector {
                match_labels: Some(selector_labels(kibana)),
                ..LabelSelector::default()
            }),
            ..PodDisruptionBudgetSpec::default()
        }),
        ..PodDisruptionBudget::default()
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use crate::crd::PodDisruptionBudgetSpec as KibanaPdbSpec;

    #[test]
    fn test_no_budget_for_zero_or_one_replica() {
        let mut kibana = fixtures::kibana();
        kibana.spec.deployment.replicas = 0;
        assert!(build_pod_disruption_budgets(&kibana).is_empty());
        kibana.spec.deployment.replicas = 1;
        assert!(build_pod_disruption_budgets(&kibana).is_empty());
    }

    #[test]
    fn test_default_budget_for_several_replicas() {
        let mut kibana = fixtures::kibana();
        kibana.spec.deployment.replicas = 3;
        let pdbs = build_pod_disruption_budgets(&kibana);
        let spec = pdbs[0].spec.as_ref().unwrap();
        assert_eq!(spec.max_unavailable, Some(IntOrString::Int(1)));
        assert_eq!(spec.min_available, None);
    }

    #[test]
    fn test_explicit_budget_wins() {
        let mut kibana = fixtures::kibana();
        kibana.spec.deployment.replicas = 0;
        kibana.spec.deployment.pod_disruption_budget = Some(KibanaPdbSpec {
            min_available: Some(IntOrString::String("50%".to_string())),
            max_unavailable: None,
        });
        let pdbs = build_pod_disruption_budgets(&kibana);
        assert_eq!(
            pdbs[0].spec.as_ref().unwrap().min_available,
            Some(IntOrString::String("50%".to_string()))
        );
    }
}
