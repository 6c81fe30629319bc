//! # Runtime
//!
//! Process level wiring of the operator.
//!
//! - `initialization.rs` - rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop.rs` - controller loop with automatic restart
//! - `watch_router.rs` - maps collaborator changes to Kibana reconciles
//! - `error_policy.rs` - per-instance backoff and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
pub mod watch_router;
