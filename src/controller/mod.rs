//! # Controller
//!
//! Core controller modules for the Kibana operator.
//!
//! - `backoff`: Exponential backoff for failed reconciles
//! - `builders`: Pure expected-object builders
//! - `checksum`: Content hashes coupling sources to pod rollouts
//! - `index`: Dependency index behind the watch router
//! - `pki`: Per-instance certificate authority
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod builders;
pub mod checksum;
pub mod index;
pub mod pki;
pub mod reconciler;
pub mod server;
