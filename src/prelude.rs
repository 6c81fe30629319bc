//! # Prelude
//!
//! Re-exports the types most callers need.
//!
//! ```rust
//! use kibana_operator::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    reconcile, BackoffState, Lifecycle, Orchestrator, Outcome, PhaseError, Reconciler,
    ReconcilerError,
};

pub use crate::controller::builders::{BuildError, Snapshot};

pub use crate::config::{ControllerConfig, ServerConfig};
