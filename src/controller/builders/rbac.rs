//! Service account and role binding of the Kibana pods.

use super::{object_meta, workload_name};
use crate::crd::Kibana;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use std::collections::BTreeMap;

/// `<instance>-kb`, when `deployment.serviceAccount` is set
#[must_use]
pub fn build_service_accounts(kibana: &Kibana) -> Vec<ServiceAccount> {
    if kibana.spec.deployment.service_account.is_none() {
        return Vec::new();
    }
    vec![ServiceAccount {
        metadata: object_meta(
            kibana,
            workload_name(kibana),
            &BTreeMap::new(),
            &BTreeMap::new(),
        ),
        ..ServiceAccount::default()
    }]
}

/// `<instance>-kb`, when a role is referenced
///
/// `roleRef` is immutable; changing it goes through delete then create.
#[must_use]
pub fn build_role_bindings(kibana: &Kibana) -> Vec<RoleBinding> {
    let Some(role_ref) = kibana
        .spec
        .deployment
        .service_account
        .as_ref()
        .and_then(|sa| sa.role_ref.as_ref())
    else {
        return Vec::new();
    };

    vec![RoleBinding {
        metadata: object_meta(
            kibana,
            workload_name(kibana),
            &BTreeMap::new(),
            &BTreeMap::new(),
        ),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: role_ref.kind.clone(),
            name: role_ref.name.clone(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: workload_name(kibana),
            namespace: Some(kibana.instance_namespace().to_string()),
            ..Subject::default()
        }]),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use crate::crd::{RoleRefSpec, ServiceAccountSpec};

    #[test]
    fn test_binding_requires_role_ref() {
        let mut kibana = fixtures::kibana();
        kibana.spec.deployment.service_account = Some(ServiceAccountSpec { role_ref: None });
        assert_eq!(build_service_accounts(&kibana).len(), 1);
        assert!(build_role_bindings(&kibana).is_empty());

        kibana.spec.deployment.service_account = Some(ServiceAccountSpec {
            role_ref: Some(RoleRefSpec {
                kind: "ClusterRole".to_string(),
                name: "kibana-reader".to_string(),
            }),
        });
        let bindings = build_role_bindings(&kibana);
        assert_eq!(bindings[0].role_ref.name, "kibana-reader");
        assert_eq!(
            bindings[0].subjects.as_ref().unwrap()[0].name,
            "logs-kb"
        );
    }
}
