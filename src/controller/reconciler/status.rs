//! # Status
//!
//! Condition bookkeeping and the status subresource patch.
//!
//! Each phase owns a `<Phase>Ready` condition. The aggregate `Ready` condition
//! follows workload readiness, or the first failing phase. Conditions start at
//! `Unknown`/`Initialize` the first time an instance is seen.

use crate::constants::FIELD_MANAGER;
use crate::controller::reconciler::types::PhaseError;
use crate::crd::{Condition, Kibana, KibanaStatus};
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;
use tracing::debug;

/// Aggregate readiness condition
pub const READY_CONDITION: &str = "Ready";

/// Value of `status.phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Initializing,
    Reconciling,
    /// A referenced object is not observable yet
    Waiting,
    /// Objects are converged, pods are rolling out
    Starting,
    Running,
    Error,
}

impl Lifecycle {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Initializing => "Initializing",
            Lifecycle::Reconciling => "Reconciling",
            Lifecycle::Waiting => "Waiting",
            Lifecycle::Starting => "Starting",
            Lifecycle::Running => "Running",
            Lifecycle::Error => "Error",
        }
    }
}

/// Condition type of a phase
#[must_use]
pub fn condition_type(phase: &str) -> String {
    format!("{phase}Ready")
}

/// Add `Unknown`/`Initialize` conditions for every phase not reported yet
pub fn initialize_conditions(status: &mut KibanaStatus, phases: &[&str], now: &str) {
    let types = phases
        .iter()
        .map(|p| condition_type(p))
        .chain(std::iter::once(READY_CONDITION.to_string()));
    for condition in types {
        if status.condition(&condition).is_none() {
            status.set_condition(Condition::new(
                condition,
                "Unknown",
                "Initialize",
                "",
                now,
            ));
        }
    }
}

/// Record the outcome of a phase on its condition
pub fn record_phase(
    status: &mut KibanaStatus,
    phase: &str,
    result: Result<(), &PhaseError>,
    now: &str,
) {
    let condition = match result {
        Ok(()) => Condition::new(condition_type(phase), "True", "Success", "", now),
        Err(e) => Condition::new(condition_type(phase), "False", e.reason(), e.to_string(), now),
    };
    status.set_condition(condition);
}

/// Set the aggregate condition, phase and error fields
pub fn record_outcome(
    status: &mut KibanaStatus,
    lifecycle: Lifecycle,
    error: Option<&PhaseError>,
    now: &str,
) {
    let ready = lifecycle == Lifecycle::Running;
    let condition = match (lifecycle, error) {
        (_, Some(e)) => Condition::new(READY_CONDITION, "False", e.reason(), e.to_string(), now),
        (Lifecycle::Running, None) => {
            Condition::new(READY_CONDITION, "True", "Ready", "Kibana is ready", now)
        }
        (Lifecycle::Starting, None) => Condition::new(
            READY_CONDITION,
            "False",
            "Starting",
            "Waiting for Kibana pods to be ready",
            now,
        ),
        (other, None) => Condition::new(READY_CONDITION, "False", other.as_str(), "", now),
    };
    status.set_condition(condition);
    status.phase = Some(lifecycle.as_str().to_string());

    // waiting on a dependency is not an error
    let on_error = error.is_some_and(|e| !matches!(e, PhaseError::DependencyNotReady(_)));
    status.is_on_error = Some(on_error);
    status.last_error_message = if on_error {
        error.map(ToString::to_string)
    } else {
        None
    };
    debug!(ready, phase = lifecycle.as_str(), "status outcome recorded");
}

/// Whether anything but the reconcile timestamp differs
#[must_use]
pub fn status_changed(old: Option<&KibanaStatus>, new: &KibanaStatus) -> bool {
    let Some(old) = old else {
        return true;
    };
    let mut old = old.clone();
    old.last_reconcile_time.clone_from(&new.last_reconcile_time);
    &old != new
}

/// Patch the status subresource, skipped when nothing changed
///
/// Unchanged status is not written so reconciles do not wake the controller
/// again through their own watch event.
///
/// # Errors
///
/// Returns the API error of the patch call.
pub async fn update_status(
    api: &Api<Kibana>,
    kibana: &Kibana,
    status: &KibanaStatus,
) -> Result<(), kube::Error> {
    if !status_changed(kibana.status.as_ref(), status) {
        debug!(
            resource.name = kibana.instance_name(),
            "Skipping status update - status unchanged"
        );
        return Ok(());
    }

    api.patch_status(
        kibana.instance_name(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(json!({ "status": status })),
    )
    .await?;
    Ok(())
}
