//! # Custom Resource Definitions
//!
//! CRD types for the Kibana operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification
//! - `elasticsearch_ref.rs` - Backing cluster reference
//! - `tls.rs` - TLS policy and self-signed certificate settings
//! - `endpoint.rs` - Ingress, route and load balancer exposure
//! - `monitoring.rs` - Prometheus and Metricbeat monitoring
//! - `deployment.rs` - Pod level deployment policy
//! - `status.rs` - Status types for tracking reconciliation state
//! - `collaborators.rs` - Kinds owned by other operators

mod collaborators;
mod deployment;
mod elasticsearch_ref;
mod endpoint;
mod monitoring;
mod spec;
mod status;
mod tls;

// Re-export all public types
pub use collaborators::{
    Elasticsearch, ElasticsearchSpec, ElasticsearchTlsSpec, Metricbeat,
    MetricbeatDeploymentSpec, MetricbeatSpec as MetricbeatResourceSpec, PodMetricsEndpoint,
    PodMonitor, PodMonitorSpec, Route, RoutePort, RouteSpec as RouteResourceSpec,
    RouteTargetReference, RouteTlsConfig, SafeTlsConfig,
};
pub use deployment::{DeploymentSpec, PodDisruptionBudgetSpec, RoleRefSpec, ServiceAccountSpec};
pub use elasticsearch_ref::{ElasticsearchRef, ExternalElasticsearchRef, ManagedElasticsearchRef};
pub use endpoint::{EndpointSpec, IngressSpec, LoadBalancerSpec, RouteSpec};
pub use monitoring::{MetricbeatSpec, MonitoringSpec, PrometheusSpec};
pub use spec::{Kibana, KibanaSpec, SecretRef};
pub use status::{Condition, KibanaStatus};
pub use tls::{SelfSignedCertificateSpec, TlsSpec};
