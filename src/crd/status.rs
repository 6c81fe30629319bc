//! # Kibana Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};

/// Status of the Kibana resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KibanaStatus {
    /// Current phase of reconciliation
    /// Values: Initializing, Reconciling, Waiting, Starting, Running, Error
    #[serde(default)]
    pub phase: Option<String>,
    /// Externally reachable URL of Kibana
    #[serde(default)]
    pub url: Option<String>,
    /// Set while a phase reports an error
    #[serde(default)]
    pub is_on_error: Option<bool>,
    /// Message of the failing phase
    #[serde(default)]
    pub last_error_message: Option<String>,
    /// One condition per phase plus the aggregate `Ready` condition
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
}

impl KibanaStatus {
    /// Find a condition by type
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Insert or replace a condition
    ///
    /// `lastTransitionTime` only moves when the status value flips.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition
                        .last_transition_time
                        .clone_from(&existing.last_transition_time);
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }

    /// Whether the condition exists and is `True`
    #[must_use]
    pub fn is_condition_true(&self, condition_type: &str) -> bool {
        self.condition(condition_type)
            .is_some_and(|c| c.status == "True")
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    pub fn new(
        condition_type: impl Into<String>,
        status: &str,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: &str,
    ) -> Self {
        Self {
            r#type: condition_type.into(),
            status: status.to_string(),
            last_transition_time: Some(now.to_string()),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_keeps_transition_time_when_status_unchanged() {
        let mut status = KibanaStatus::default();
        status.set_condition(Condition::new("TlsReady", "True", "Success", "", "t1"));
        status.set_condition(Condition::new("TlsReady", "True", "Success", "ok", "t2"));

        let cond = status.condition("TlsReady").unwrap();
        assert_eq!(cond.last_transition_time.as_deref(), Some("t1"));
        assert_eq!(cond.message.as_deref(), Some("ok"));
        assert_eq!(status.conditions.len(), 1);
    }

    #[test]
    fn test_set_condition_moves_transition_time_on_flip() {
        let mut status = KibanaStatus::default();
        status.set_condition(Condition::new("Ready", "Unknown", "Initialize", "", "t1"));
        status.set_condition(Condition::new("Ready", "True", "Ready", "", "t2"));

        assert_eq!(
            status.condition("Ready").unwrap().last_transition_time.as_deref(),
            Some("t2")
        );
        assert!(status.is_condition_true("Ready"));
    }
}
