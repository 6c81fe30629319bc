//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the Kibana custom resource, also used as label/annotation domain
pub const DOMAIN: &str = "kibana.k8s.webcenter.fr";

/// Field manager name used for create/patch calls
pub const FIELD_MANAGER: &str = "kibana-operator";

/// Label carrying the owning Kibana instance name
pub const CLUSTER_LABEL: &str = "cluster";

/// Annotation holding the last-applied baseline used for three-way diffs
pub const LAST_APPLIED_ANNOTATION: &str = "kibana.k8s.webcenter.fr/last-applied-configuration";

/// Fixed suffix appended to every object name derived from an instance
pub const NAME_SUFFIX: &str = "kb";

/// Kibana HTTP(S) port
pub const KIBANA_PORT: i32 = 5601;

/// Backing Elasticsearch HTTP(S) port
pub const ELASTICSEARCH_PORT: i32 = 9200;

/// Default Kibana image (version is appended as tag)
pub const DEFAULT_IMAGE: &str = "docker.elastic.co/kibana/kibana";

/// Built-in user Kibana authenticates as against a managed backing cluster
pub const KIBANA_SYSTEM_USER: &str = "kibana_system";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Fixed requeue interval while a referenced dependency is not observable yet (seconds)
pub const DEFAULT_DEPENDENCY_WAIT_SECS: u64 = 30;

/// Requeue interval of converged instances (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 3600;

/// Default error backoff starting value (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default error backoff maximum value (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default operator namespace when `POD_NAMESPACE` is not set
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "kibana-operator-system";

/// Self-signed certificate defaults
pub const DEFAULT_KEY_SIZE: u32 = 2048;
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;
pub const DEFAULT_RENEWAL_DAYS: u32 = 30;
