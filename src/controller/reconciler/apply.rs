//! # Apply
//!
//! Executes a [`Diff`] against the API server.
//!
//! Creates use the expected object, updates send the JSON merge patch computed
//! by the diff (it carries the observed resource version, so a stale write
//! fails with 409). When the server rejects an update because it touches an
//! immutable field, the object is deleted and then created again, in that
//! order.

use crate::constants::FIELD_MANAGER;
use crate::controller::reconciler::diff::Diff;
use crate::controller::reconciler::phase::ManagedResource;
use crate::controller::reconciler::types::PhaseError;
use crate::observability::metrics;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::ResourceExt;
use tracing::{info, warn};

/// Calls made by one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
    pub deleted: usize,
}

impl ApplyReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created + self.updated + self.recreated + self.deleted == 0
    }
}

/// Update rejected because it changes a field the server treats as immutable
#[must_use]
pub fn is_immutable_error(error: &kube::Error) -> bool {
    let kube::Error::Api(response) = error else {
        return false;
    };
    if response.code != 422 && response.code != 403 {
        return false;
    }
    let message = response.message.to_lowercase();
    message.contains("immutable") || message.contains("cannot change")
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PostParams::default()
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PatchParams::default()
    }
}

/// Apply `diff`, returning the objects that exist afterwards
///
/// # Errors
///
/// The first failing call aborts the phase.
pub async fn apply<K: ManagedResource>(
    api: &Api<K>,
    phase: &'static str,
    diff: Diff<K>,
) -> Result<(Vec<K>, ApplyReport), PhaseError> {
    let mut report = ApplyReport::default();
    let mut current = diff.unchanged;

    for object in diff.create {
        let created = api.create(&post_params(), &object).await?;
        info!(phase, object = created.name_any().as_str(), "created");
        metrics::increment_phase_operations(phase, "create");
        report.created += 1;
        current.push(created);
    }

    for update in diff.update {
        let name = update.expected.name_any();
        match api
            .patch(&name, &patch_params(), &Patch::Merge(&update.patch))
            .await
        {
            Ok(updated) => {
                info!(phase, object = name.as_str(), "updated");
                metrics::increment_phase_operations(phase, "update");
                report.updated += 1;
                current.push(updated);
            }
            Err(e) if is_immutable_error(&e) => {
                warn!(
                    phase,
                    object = name.as_str(),
                    error = %e,
                    "update touches an immutable field, recreating"
                );
                api.delete(&name, &DeleteParams::background()).await?;
                let created = api.create(&post_params(), &update.expected).await?;
                metrics::increment_phase_operations(phase, "recreate");
                report.recreated += 1;
                current.push(created);
            }
            Err(e) => return Err(e.into()),
        }
    }

    for object in diff.delete {
        let name = object.name_any();
        match api.delete(&name, &DeleteParams::background()).await {
            Ok(_) => {
                info!(phase, object = name.as_str(), "deleted");
                metrics::increment_phase_operations(phase, "delete");
                report.deleted += 1;
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok((current, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: "Invalid".to_string(),
            code,
        })
    }

    #[test]
    fn test_immutable_errors_are_detected() {
        assert!(is_immutable_error(&api_error(
            422,
            "RoleBinding.rbac.authorization.k8s.io \"logs-kb\" is invalid: roleRef: Invalid value: cannot change roleRef"
        )));
        assert!(is_immutable_error(&api_error(
            422,
            "Deployment.apps \"logs-kb\" is invalid: spec.selector: Invalid value: field is immutable"
        )));
        assert!(is_immutable_error(&api_error(403, "Forbidden: field is Immutable")));
    }

    #[test]
    fn test_other_errors_are_not_immutable() {
        assert!(!is_immutable_error(&api_error(409, "field is immutable")));
        assert!(!is_immutable_error(&api_error(422, "spec.replicas: must be >= 0")));
        assert!(!is_immutable_error(&api_error(403, "secrets is forbidden: User cannot patch")));
    }

    #[test]
    fn test_report_emptiness() {
        assert!(ApplyReport::default().is_empty());
        let report = ApplyReport {
            recreated: 1,
            ..ApplyReport::default()
        };
        assert!(!report.is_empty());
    }
}
