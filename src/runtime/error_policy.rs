//! # Error Policy
//!
//! Backoff after failed reconciles and classification of the errors the
//! controller stream yields. Nothing here blocks the stream.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError, RequeueReason};
use crate::crd::Kibana;
use crate::observability::metrics;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Requeue a failed instance with its own exponential backoff
///
/// Backoff state is kept per instance so one failing instance never slows
/// down the others. It is reset by the next successful reconcile.
pub fn handle_reconciliation_error(
    kibana: Arc<Kibana>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let identity = kibana.identity();
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(identity.clone()).or_insert_with(|| {
                BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs)
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!(error = %e, "failed to lock backoff states, using maximum backoff");
            (ctx.config.backoff_max_secs, 0)
        }
    };

    match error {
        ReconcilerError::Conflict(message) => info!(
            resource.name = kibana.instance_name(),
            resource.namespace = kibana.instance_namespace(),
            backoff_seconds,
            "write conflict, retrying: {message}"
        ),
        other => error!(
            resource.name = kibana.instance_name(),
            resource.namespace = kibana.instance_namespace(),
            error = %other,
            error_count,
            backoff_seconds,
            "reconciliation failed"
        ),
    }

    metrics::increment_requeues_total(RequeueReason::ErrorBackoff.as_str());
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Class of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 404, typically a CRD that is not installed
    NotFound,
    /// 401, RBAC revoked or token expired
    Unauthorized,
    /// 410, resource version too old
    Expired,
    /// 429, API server storage reinitializing
    TooManyRequests,
    Other,
}

impl WatchErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WatchErrorKind::NotFound => "not-found",
            WatchErrorKind::Unauthorized => "unauthorized",
            WatchErrorKind::Expired => "expired",
            WatchErrorKind::TooManyRequests => "too-many-requests",
            WatchErrorKind::Other => "other",
        }
    }
}

/// Classify a watch error from its debug rendering
#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorKind {
    // 404 first: a plain text 404 body surfaces as a WatchFailed serde error
    let not_found =
        error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found");
    if not_found {
        WatchErrorKind::NotFound
    } else if error.contains("401") || error.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error.contains("429")
        || error.contains("storage is (re)initializing")
        || error.contains("TooManyRequests")
    {
        WatchErrorKind::TooManyRequests
    } else {
        WatchErrorKind::Other
    }
}

/// Errors surfaced by the controller stream
pub type ControllerError = controller::Error<ReconcilerError, watcher::Error>;

/// Log an error item of the controller stream
///
/// Reconcile failures were already logged and requeued by
/// [`handle_reconciliation_error`]. Watch errors are classified and logged;
/// the watchers inside the controller retry on their own with backoff, so
/// nothing here waits. Returns the class of watch errors.
pub fn handle_controller_error(error: &ControllerError) -> Option<WatchErrorKind> {
    let watch_error = match error {
        controller::Error::ReconcilerFailed(error, object) => {
            debug!(instance = %object, error = %error, "reconcile failed, requeued with backoff");
            return None;
        }
        controller::Error::ObjectNotFound(object) => {
            debug!(instance = %object, "instance gone before its reconcile");
            return None;
        }
        controller::Error::QueueError(watch_error) => watch_error,
        other => {
            error!(error = %other, "controller runner error");
            return None;
        }
    };

    let rendered = format!("{watch_error:?}");
    let kind = classify_watch_error(&rendered);
    metrics::increment_watch_errors(kind.as_str());
    match kind {
        WatchErrorKind::NotFound => {
            warn!(error = %watch_error, "watched resource not found, is every CRD installed?");
        }
        WatchErrorKind::Unauthorized => error!(
            error = %watch_error,
            "watch authentication failed (401): check the operator ClusterRole, its binding and service account token"
        ),
        WatchErrorKind::Expired => {
            info!("watch resource version expired (410), the watcher relists");
        }
        WatchErrorKind::TooManyRequests => {
            warn!("API server storage reinitializing (429), the watcher backs off");
        }
        WatchErrorKind::Other => error!(error = %watch_error, "controller watch error"),
    }
    Some(kind)
}
