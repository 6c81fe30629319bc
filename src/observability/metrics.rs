//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `kibana_operator_reconciliations_total` - Total number of reconciliations
//! - `kibana_operator_reconciliation_errors_total` - Total number of failed reconciliations
//! - `kibana_operator_reconciliation_duration_seconds` - Duration of reconciliations
//! - `kibana_operator_phase_operations_total` - Create/update/delete/recreate calls per phase
//! - `kibana_operator_certificate_renewals_total` - Certificate authorities (re)generated
//! - `kibana_operator_dependency_waits_total` - Reconciles parked on a missing dependency, per phase
//! - `kibana_operator_requeues_total` - Requeues by reason
//! - `kibana_operator_watch_triggers_total` - Reconciles triggered by a collaborator change, per kind
//! - `kibana_operator_watch_errors_total` - Controller watch errors by class

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kibana_operator_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kibana_operator_reconciliation_errors_total",
        "Total number of failed reconciliations",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "kibana_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static PHASE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kibana_operator_phase_operations_total",
            "Total number of object operations by phase and operation",
        ),
        &["phase", "operation"],
    )
    .expect("Failed to create PHASE_OPERATIONS_TOTAL metric - this should never happen")
});

static CERTIFICATE_RENEWALS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kibana_operator_certificate_renewals_total",
        "Total number of certificate authorities generated or regenerated",
    )
    .expect("Failed to create CERTIFICATE_RENEWALS_TOTAL metric - this should never happen")
});

static DEPENDENCY_WAITS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kibana_operator_dependency_waits_total",
            "Total number of reconciles waiting on a missing dependency by phase",
        ),
        &["phase"],
    )
    .expect("Failed to create DEPENDENCY_WAITS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kibana_operator_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static WATCH_TRIGGERS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kibana_operator_watch_triggers_total",
            "Total number of reconciles triggered by a referenced object by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create WATCH_TRIGGERS_TOTAL metric - this should never happen")
});

static WATCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kibana_operator_watch_errors_total",
            "Total number of controller watch errors by class",
        ),
        &["class"],
    )
    .expect("Failed to create WATCH_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the process registry
///
/// # Errors
///
/// Fails when called twice in the same process.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PHASE_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATE_RENEWALS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPENDENCY_WAITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_TRIGGERS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// `operation` is one of create, update, delete, recreate
pub fn increment_phase_operations(phase: &str, operation: &str) {
    PHASE_OPERATIONS_TOTAL
        .with_label_values(&[phase, operation])
        .inc();
}

pub fn increment_certificate_renewals() {
    CERTIFICATE_RENEWALS_TOTAL.inc();
}

pub fn increment_dependency_waits(phase: &str) {
    DEPENDENCY_WAITS_TOTAL.with_label_values(&[phase]).inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_watch_triggers(kind: &str) {
    WATCH_TRIGGERS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_watch_errors(class: &str) {
    WATCH_ERRORS_TOTAL.with_label_values(&[class]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        assert!(register_metrics().is_ok());
        // second registration is rejected by the registry
        assert!(register_metrics().is_err());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert_eq!(RECONCILIATIONS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_increment_reconciliation_errors() {
        let before = RECONCILIATION_ERRORS_TOTAL.get();
        increment_reconciliation_errors();
        assert_eq!(RECONCILIATION_ERRORS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        let before = RECONCILIATION_DURATION.get_sample_count();
        observe_reconciliation_duration(0.2);
        assert_eq!(RECONCILIATION_DURATION.get_sample_count(), before + 1);
    }

    #[test]
    fn test_phase_operations_are_labelled() {
        let counter = PHASE_OPERATIONS_TOTAL.with_label_values(&["RoleBinding", "recreate"]);
        let before = counter.get();
        increment_phase_operations("RoleBinding", "recreate");
        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_labelled_counters() {
        let waits = DEPENDENCY_WAITS_TOTAL.with_label_values(&["Credential"]);
        let requeues = REQUEUES_TOTAL.with_label_values(&["dependency-not-ready"]);
        let triggers = WATCH_TRIGGERS_TOTAL.with_label_values(&["Secret"]);
        let (w, r, t) = (waits.get(), requeues.get(), triggers.get());

        increment_dependency_waits("Credential");
        increment_requeues_total("dependency-not-ready");
        increment_watch_triggers("Secret");

        assert_eq!(waits.get(), w + 1);
        assert_eq!(requeues.get(), r + 1);
        assert_eq!(triggers.get(), t + 1);
    }
}
