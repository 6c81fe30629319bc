//! Kibana Operator Library
//!
//! Reconciles `Kibana` resources into the Kubernetes objects running and
//! exposing a Kibana instance: PKI secrets, configuration, Deployment,
//! Service, Ingress or Route, disruption budget, RBAC and monitoring.
//!
//! ## Quick Start
//!
//! ```rust
//! use kibana_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
