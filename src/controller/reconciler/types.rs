//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::builders::BuildError;
use crate::controller::index::DependencyIndex;
use crate::controller::pki::PkiError;
use crate::controller::reconciler::orchestrator::Orchestrator;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Failure of one phase
///
/// Variants follow the error taxonomy: a missing dependency is a wait, a
/// validation failure needs a spec change, everything else is retried with
/// backoff.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// Referenced collaborator object is not observable yet
    #[error("{0}")]
    DependencyNotReady(String),

    /// The spec is internally inconsistent
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Certificate(#[from] PkiError),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PhaseError {
    /// Condition reason reported for this error
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            PhaseError::DependencyNotReady(_) => "DependencyNotReady",
            PhaseError::Validation(_) | PhaseError::Build(_) => "ValidationFailed",
            PhaseError::Certificate(_) => "CertificateError",
            PhaseError::Kube(_) | PhaseError::Serialization(_) => "ReconcileFailed",
        }
    }

    /// Resource version mismatch on write
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, PhaseError::Kube(kube::Error::Api(e)) if e.code == 409)
    }

    /// Needs a spec change rather than a retry
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, PhaseError::Validation(_) | PhaseError::Build(_))
    }
}

/// What the runtime error policy sees
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("phase {phase} failed: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: PhaseError,
    },

    /// Optimistic concurrency failure, retried without touching status
    #[error("conflict while writing {0}")]
    Conflict(String),

    #[error("status update failed: {0}")]
    Status(#[source] kube::Error),
}

/// Why a reconcile was requeued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueReason {
    /// A referenced object is not observable yet (fixed delay)
    DependencyNotReady,
    /// Workload rollout in progress
    Rollout,
    /// Backoff after a failed reconcile
    ErrorBackoff,
}

impl RequeueReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RequeueReason::DependencyNotReady => "dependency-not-ready",
            RequeueReason::Rollout => "rollout",
            RequeueReason::ErrorBackoff => "error-backoff",
        }
    }
}

/// Backoff state for one Kibana instance
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: ExponentialBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Backoff state per instance (`namespace/name`)
pub type BackoffStates = Arc<Mutex<HashMap<String, BackoffState>>>;

/// Drop the backoff entry of an instance
///
/// Called after a successful reconcile and when the instance goes away, so the
/// map only holds instances currently failing.
pub fn forget_backoff(states: &BackoffStates, identity: &str) {
    if let Ok(mut states) = states.lock() {
        states.remove(identity);
    }
}

/// Shared controller context
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub config: Arc<ControllerConfig>,
    pub index: Arc<DependencyIndex>,
    pub orchestrator: Arc<Orchestrator>,
    /// Owned by the error policy
    pub backoff_states: BackoffStates,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("index", &self.index)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Client, config: ControllerConfig, index: Arc<DependencyIndex>) -> Self {
        Self {
            client,
            config: Arc::new(config),
            index,
            orchestrator: Arc::new(Orchestrator::default()),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the backoff of an instance
    pub fn clear_backoff(&self, identity: &str) {
        forget_backoff(&self.backoff_states, identity);
    }
}
