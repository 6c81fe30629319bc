//! # Validation
//!
//! Spec consistency checks run before any phase. A failure is terminal for the
//! current generation: it is reported on the `Ready` condition and the
//! instance waits for a spec change.

use crate::controller::reconciler::types::PhaseError;
use crate::crd::{ElasticsearchRef, Kibana};
use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

const SUPPORTED_KEY_SIZES: [u32; 3] = [2048, 3072, 4096];

static DNS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("DNS name pattern is a valid regex")
});

/// Validate a DNS-1123 subdomain, a leading `*.` wildcard label is accepted
pub fn validate_dns_name(name: &str, field_name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > 253 {
        return Err(format!(
            "{field_name} '{name}' must be between 1 and 253 characters"
        ));
    }
    if !DNS_NAME.is_match(name) {
        return Err(format!(
            "{field_name} '{name}' must be a valid DNS name (lowercase alphanumeric, hyphens, dots)"
        ));
    }
    Ok(())
}

fn validate_elasticsearch_ref(reference: &ElasticsearchRef) -> Result<(), String> {
    match (&reference.managed, &reference.external) {
        (Some(_), Some(_)) => Err(
            "elasticsearchRef must set exactly one of managed or external, got both".to_string(),
        ),
        (None, None) => Err(
            "elasticsearchRef must set exactly one of managed or external, got none".to_string(),
        ),
        (Some(managed), None) if managed.name.trim().is_empty() => {
            Err("elasticsearchRef.managed.name cannot be empty".to_string())
        }
        (None, Some(external)) if external.addresses.is_empty() => {
            Err("elasticsearchRef.external.addresses cannot be empty".to_string())
        }
        _ => Ok(()),
    }
}

/// Every inconsistency of the spec, in field order
#[must_use]
pub fn validation_errors(kibana: &Kibana) -> Vec<String> {
    let spec = &kibana.spec;
    let mut errors = Vec::new();

    if spec.version.trim().is_empty() {
        errors.push("version cannot be empty".to_string());
    }
    if let Some(reference) = &spec.elasticsearch_ref {
        if let Err(e) = validate_elasticsearch_ref(reference) {
            errors.push(e);
        }
    }

    if kibana.self_signed_tls() {
        let settings = spec.tls.self_signed();
        if !SUPPORTED_KEY_SIZES.contains(&settings.key_size) {
            errors.push(format!(
                "tls.selfSignedCertificate.keySize must be one of 2048, 3072, 4096, got {}",
                settings.key_size
            ));
        }
        if settings.renewal_days == 0 || settings.renewal_days >= settings.validity_days {
            errors.push(format!(
                "tls.selfSignedCertificate.renewalDays ({}) must be greater than 0 and lower than validityDays ({})",
                settings.renewal_days, settings.validity_days
            ));
        }
        for name in &settings.alt_names {
            if let Err(e) = validate_dns_name(name, "tls.selfSignedCertificate.altNames") {
                errors.push(e);
            }
        }
        for ip in &settings.alt_ips {
            if ip.parse::<IpAddr>().is_err() {
                errors.push(format!(
                    "tls.selfSignedCertificate.altIps '{ip}' is not an IP address"
                ));
            }
        }
    }

    if spec.deployment.replicas < 0 {
        errors.push(format!(
            "deployment.replicas must be >= 0, got {}",
            spec.deployment.replicas
        ));
    }
    if let Some(metricbeat) = spec.monitoring.metricbeat() {
        match &metricbeat.elasticsearch_ref {
            None => errors.push(
                "monitoring.metricbeat.elasticsearchRef is required when metricbeat is enabled"
                    .to_string(),
            ),
            Some(reference) => {
                if let Err(e) = validate_elasticsearch_ref(reference) {
                    errors.push(format!("monitoring.metricbeat: {e}"));
                }
            }
        }
    }

    errors
}

/// Validate the whole spec
///
/// # Errors
///
/// [`PhaseError::Validation`] with every failure joined.
pub fn validate_kibana(kibana: &Kibana) -> Result<(), PhaseError> {
    let errors = validation_errors(kibana);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PhaseError::Validation(errors.join("; ")))
    }
}
