//! # Orchestrator
//!
//! Runs Configure, then every registered phase in order, for one instance.
//!
//! Phases run strictly sequentially: later phases read what earlier phases put
//! in the snapshot. The first failing phase stops the pass. Its condition is
//! recorded, except for write conflicts, which leave the status untouched and
//! are retried by the runtime.

use crate::controller::reconciler::phase::{Phase, ReconcileContext};
use crate::controller::reconciler::phases::default_phases;
use crate::controller::reconciler::status::{
    initialize_conditions, record_outcome, record_phase, Lifecycle,
};
use crate::controller::reconciler::types::PhaseError;
use crate::controller::reconciler::validation::validate_kibana;
use crate::crd::KibanaStatus;
use crate::observability::metrics;
use tracing::{debug, info, warn};

/// Pseudo phase of the spec validation step
pub const CONFIGURE_PHASE: &str = "Configure";

/// Result of one pass
#[derive(Debug)]
pub enum Outcome {
    /// Every phase converged; `ready` reflects the workload rollout
    Converged { ready: bool },
    /// A referenced object is not observable yet
    Waiting {
        phase: &'static str,
        error: PhaseError,
    },
    /// A phase failed
    Failed {
        phase: &'static str,
        error: PhaseError,
    },
    /// Stale resource version on write
    Conflict {
        phase: &'static str,
        error: PhaseError,
    },
}

impl Outcome {
    /// Status phase reported for this outcome
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            Outcome::Converged { ready: true } => Lifecycle::Running,
            Outcome::Converged { ready: false } => Lifecycle::Starting,
            Outcome::Waiting { .. } => Lifecycle::Waiting,
            Outcome::Failed { .. } => Lifecycle::Error,
            Outcome::Conflict { .. } => Lifecycle::Reconciling,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&PhaseError> {
        match self {
            Outcome::Converged { .. } => None,
            Outcome::Waiting { error, .. }
            | Outcome::Failed { error, .. }
            | Outcome::Conflict { error, .. } => Some(error),
        }
    }

    /// Record the aggregate condition; conflicts are not recorded
    pub fn record(&self, status: &mut KibanaStatus, now: &str) {
        if matches!(self, Outcome::Conflict { .. }) {
            return;
        }
        record_outcome(status, self.lifecycle(), self.error(), now);
    }
}

/// Ordered list of phases
pub struct Orchestrator {
    phases: Vec<Box<dyn Phase>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phases", &self.phase_names())
            .finish()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(default_phases())
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(phases: Vec<Box<dyn Phase>>) -> Self {
        Self { phases }
    }

    #[must_use]
    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    /// Run one pass, recording phase conditions into `status`
    pub async fn run(&self, ctx: &mut ReconcileContext, status: &mut KibanaStatus) -> Outcome {
        let now = ctx.now.to_rfc3339();
        initialize_conditions(status, &self.phase_names(), &now);

        if let Err(error) = validate_kibana(&ctx.kibana) {
            warn!(
                resource.name = ctx.kibana.instance_name(),
                resource.namespace = ctx.kibana.instance_namespace(),
                error = %error,
                "spec validation failed"
            );
            return Outcome::Failed {
                phase: CONFIGURE_PHASE,
                error,
            };
        }

        for phase in &self.phases {
            let name = phase.name();
            match phase.run(ctx).await {
                Ok(report) => {
                    record_phase(status, name, Ok(()), &now);
                    if !report.is_empty() {
                        info!(
                            resource.name = ctx.kibana.instance_name(),
                            phase = name,
                            created = report.created,
                            updated = report.updated,
                            recreated = report.recreated,
                            deleted = report.deleted,
                            "phase converged"
                        );
                    }
                }
                Err(error) if error.is_conflict() => {
                    debug!(phase = name, error = %error, "write conflict");
                    return Outcome::Conflict { phase: name, error };
                }
                Err(error @ PhaseError::DependencyNotReady(_)) => {
                    info!(
                        resource.name = ctx.kibana.instance_name(),
                        phase = name,
                        reason = %error,
                        "waiting for dependency"
                    );
                    metrics::increment_dependency_waits(name);
                    record_phase(status, name, Err(&error), &now);
                    return Outcome::Waiting { phase: name, error };
                }
                Err(error) => {
                    warn!(
                        resource.name = ctx.kibana.instance_name(),
                        phase = name,
                        error = %error,
                        "phase failed"
                    );
                    record_phase(status, name, Err(&error), &now);
                    return Outcome::Failed { phase: name, error };
                }
            }
        }

        Outcome::Converged {
            ready: ctx.workload_ready.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::Condition;

    #[test]
    fn test_default_catalogue() {
        let orchestrator = Orchestrator::default();
        let names = orchestrator.phase_names();
        assert_eq!(names.len(), 15);
        assert_eq!(names.first(), Some(&"Tls"));
        assert_eq!(names.last(), Some(&"Metricbeat"));
    }

    #[test]
    fn test_outcome_lifecycle() {
        assert_eq!(
            Outcome::Converged { ready: true }.lifecycle(),
            Lifecycle::Running
        );
        assert_eq!(
            Outcome::Converged { ready: false }.lifecycle(),
            Lifecycle::Starting
        );
        let waiting = Outcome::Waiting {
            phase: "CaElasticsearch",
            error: PhaseError::DependencyNotReady("Elasticsearch observability/es not found".into()),
        };
        assert_eq!(waiting.lifecycle(), Lifecycle::Waiting);
        assert!(waiting.error().is_some());
    }

    #[test]
    fn test_conflict_leaves_status_untouched() {
        let mut status = KibanaStatus::default();
        status.set_condition(Condition::new("Ready", "True", "Ready", "Kibana is ready", "t0"));
        status.phase = Some("Running".to_string());
        let before = status.clone();

        let conflict = Outcome::Conflict {
            phase: "Deployment",
            error: PhaseError::Kube(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "the object has been modified".to_string(),
                reason: "Conflict".to_string(),
                code: 409,
            })),
        };
        conflict.record(&mut status, "t1");
        assert_eq!(status, before);
    }

    #[test]
    fn test_failure_is_recorded() {
        let mut status = KibanaStatus::default();
        let failed = Outcome::Failed {
            phase: CONFIGURE_PHASE,
            error: PhaseError::Validation("version cannot be empty".into()),
        };
        failed.record(&mut status, "t1");
        assert_eq!(status.phase.as_deref(), Some("Error"));
        assert_eq!(status.is_on_error, Some(true));
    }
}
