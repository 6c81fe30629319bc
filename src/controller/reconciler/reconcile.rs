//! # Reconciliation Logic
//!
//! Entry point called by the controller runtime for one Kibana instance.
//!
//! A pass refreshes the dependency index entry of the instance, runs the
//! orchestrator, writes the aggregated status and maps the outcome to a
//! requeue action. Errors are left to the error policy, which owns the
//! backoff.

use crate::controller::builders::kibana_url;
use crate::controller::reconciler::orchestrator::Outcome;
use crate::controller::reconciler::phase::ReconcileContext;
use crate::controller::reconciler::status::{initialize_conditions, update_status, Lifecycle};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, RequeueReason};
use crate::crd::{Kibana, KibanaStatus};
use crate::observability::metrics;
use kube::api::Api;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Reconcile one Kibana instance
///
/// # Errors
///
/// Phase failures other than dependency waits and validation errors, write
/// conflicts and status update failures.
pub async fn reconcile(
    kibana: Arc<Kibana>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = kibana.instance_name(),
        resource.namespace = kibana.instance_namespace(),
        resource.kind = "Kibana",
    );
    reconcile_internal(kibana, ctx).instrument(span).await
}

/// Status phase written before the phases run, if any
fn progress_phase(kibana: &Kibana) -> Option<Lifecycle> {
    match &kibana.status {
        None => Some(Lifecycle::Initializing),
        Some(status) if status.observed_generation != kibana.metadata.generation => {
            Some(Lifecycle::Reconciling)
        }
        Some(_) => None,
    }
}

async fn reconcile_internal(
    kibana: Arc<Kibana>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    metrics::increment_reconciliations();
    let identity = kibana.identity();
    ctx.index.upsert(&kibana);

    if kibana.metadata.deletion_timestamp.is_some() {
        debug!("instance is being deleted, owned objects are garbage collected");
        ctx.clear_backoff(&identity);
        return Ok(Action::await_change());
    }

    let api: Api<Kibana> = Api::namespaced(ctx.client.clone(), kibana.instance_namespace());
    let mut run = ReconcileContext::new(
        ctx.client.clone(),
        kibana.clone(),
        &ctx.config.operator_namespace,
    );
    let now = run.now.to_rfc3339();
    let mut status = kibana.status.clone().unwrap_or_default();

    if let Some(lifecycle) = progress_phase(&kibana) {
        info!(
            generation = kibana.metadata.generation,
            phase = lifecycle.as_str(),
            "reconciling new generation"
        );
        initialize_conditions(&mut status, &ctx.orchestrator.phase_names(), &now);
        status.phase = Some(lifecycle.as_str().to_string());
        write_status(&api, &kibana, &status).await?;
    }

    let outcome = ctx.orchestrator.run(&mut run, &mut status).await;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    if !matches!(outcome, Outcome::Conflict { .. }) {
        outcome.record(&mut status, &now);
        status.url = Some(kibana_url(&kibana));
        status.observed_generation = kibana.metadata.generation;
        status.last_reconcile_time = Some(now);
        write_status(&api, &kibana, &status).await?;
    }

    let dependency_wait = ctx.config.dependency_wait();
    match outcome {
        Outcome::Converged { ready: true } => {
            ctx.clear_backoff(&identity);
            info!(url = status.url.as_deref(), "kibana is ready");
            Ok(Action::requeue(ctx.config.resync_interval()))
        }
        Outcome::Converged { ready: false } => {
            ctx.clear_backoff(&identity);
            debug!("waiting for pods to become ready");
            metrics::increment_requeues_total(RequeueReason::Rollout.as_str());
            Ok(Action::requeue(dependency_wait))
        }
        Outcome::Waiting { .. } => {
            ctx.clear_backoff(&identity);
            metrics::increment_requeues_total(RequeueReason::DependencyNotReady.as_str());
            Ok(Action::requeue(dependency_wait))
        }
        Outcome::Failed { error, .. } if error.is_validation() => {
            metrics::increment_reconciliation_errors();
            info!(error = %error, "waiting for a spec change");
            Ok(Action::await_change())
        }
        Outcome::Failed { phase, error } => {
            metrics::increment_reconciliation_errors();
            Err(ReconcilerError::Phase {
                phase,
                source: error,
            })
        }
        Outcome::Conflict { phase, error } => Err(ReconcilerError::Conflict(format!(
            "{identity} during phase {phase}: {error}"
        ))),
    }
}

async fn write_status(
    api: &Api<Kibana>,
    kibana: &Kibana,
    status: &KibanaStatus,
) -> Result<(), ReconcilerError> {
    update_status(api, kibana, status)
        .await
        .map_err(ReconcilerError::Status)
}
