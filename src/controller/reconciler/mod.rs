//! # Reconciler
//!
//! Convergence engine for `Kibana` resources.
//!
//! The reconciler:
//! - Validates the spec (Configure)
//! - Runs one phase per managed kind: Read → Diff → Apply → OnResult
//! - Aggregates per-phase conditions into the status
//! - Requeues on dependency waits and rollouts, leaves errors to the error policy
//!
//! ## Module Structure
//!
//! - `phase.rs` - phase traits and the generic adapter
//! - `phases/` - the fifteen concrete phases
//! - `diff.rs` / `apply.rs` - three-way diff and API calls
//! - `orchestrator.rs` - ordered phase execution
//! - `status.rs` - condition bookkeeping
//! - `validation.rs` - spec validation
//! - `reconcile.rs` - runtime entry point

pub mod apply;
pub mod diff;
pub mod orchestrator;
pub mod phase;
pub mod phases;
pub mod reconcile;
pub mod status;
pub mod types;
pub mod validation;

// Re-export public API
pub use apply::{apply, is_immutable_error, ApplyReport};
pub use diff::{diff, Diff, Update};
pub use orchestrator::{Orchestrator, Outcome};
pub use phase::{
    is_kind_not_served, KindReconciler, ManagedResource, Phase, PhaseAdapter, ReconcileContext,
};
pub use reconcile::reconcile;
pub use status::{Lifecycle, READY_CONDITION};
pub use types::{
    forget_backoff, BackoffState, BackoffStates, PhaseError, Reconciler, ReconcilerError,
    RequeueReason,
};
pub use validation::{validate_kibana, validation_errors};
