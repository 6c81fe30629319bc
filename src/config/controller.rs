//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_or_default, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_DEPENDENCY_WAIT_SECS,
    DEFAULT_OPERATOR_NAMESPACE, DEFAULT_RESYNC_INTERVAL_SECS,
    DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace the operator runs in
    /// Instances living elsewhere get a network policy admitting the operator
    pub operator_namespace: String,
    /// Requeue delay when a referenced object is not observable yet (seconds)
    pub dependency_wait_secs: u64,
    /// Requeue delay of a converged instance, bounds how late a certificate
    /// renewal can be noticed (seconds)
    pub resync_interval_secs: u64,
    /// Exponential backoff starting value after a failed reconcile (seconds)
    pub backoff_min_secs: u64,
    /// Exponential backoff maximum value (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream restart delay after the stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Maximum concurrent reconciliations across instances
    pub max_concurrent_reconciliations: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            dependency_wait_secs: DEFAULT_DEPENDENCY_WAIT_SECS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            max_concurrent_reconciliations: 10,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            operator_namespace: env_var_or_default_str("POD_NAMESPACE", DEFAULT_OPERATOR_NAMESPACE),
            dependency_wait_secs: env_var_or_default(
                "DEPENDENCY_WAIT_SECS",
                DEFAULT_DEPENDENCY_WAIT_SECS,
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                10,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Get dependency wait duration
    #[must_use]
    pub fn dependency_wait(&self) -> Duration {
        Duration::from_secs(self.dependency_wait_secs)
    }

    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ControllerConfig::default();
        assert_eq!(config.dependency_wait(), Duration::from_secs(30));
        assert_eq!(config.resync_interval(), Duration::from_secs(3600));
        assert_eq!(config.backoff_min_secs, 5);
        assert_eq!(config.backoff_max_secs, 300);
        assert_eq!(config.operator_namespace, "kibana-operator-system");
    }
}
