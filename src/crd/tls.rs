//! # TLS Policy
//!
//! Certificate settings of the Kibana HTTP endpoint.

use crate::constants::{DEFAULT_KEY_SIZE, DEFAULT_RENEWAL_DAYS, DEFAULT_VALIDITY_DAYS};
use crate::crd::SecretRef;
use serde::{Deserialize, Serialize};

/// TLS policy
///
/// When enabled without `certificateSecretRef`, the operator runs its own
/// certificate authority per instance and issues the serving certificate.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Serve Kibana over HTTPS
    /// Default: true
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Secret holding `tls.crt`, `tls.key` and optionally `ca.crt`
    /// When set, no certificate authority is generated
    #[serde(default)]
    pub certificate_secret_ref: Option<SecretRef>,
    /// Self-signed certificate settings
    #[serde(default)]
    pub self_signed_certificate: Option<SelfSignedCertificateSpec>,
}

impl TlsSpec {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Self-signed settings with defaults applied
    #[must_use]
    pub fn self_signed(&self) -> SelfSignedCertificateSpec {
        self.self_signed_certificate.clone().unwrap_or_default()
    }
}

/// Self-signed certificate settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelfSignedCertificateSpec {
    /// Extra DNS names added to the leaf certificate
    #[serde(default)]
    pub alt_names: Vec<String>,
    /// Extra IP addresses added to the leaf certificate
    #[serde(default)]
    pub alt_ips: Vec<String>,
    /// RSA key size in bits (2048, 3072 or 4096)
    #[serde(default = "default_key_size")]
    pub key_size: u32,
    /// Validity of the CA and leaf certificates in days
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
    /// Renew when the remaining validity drops below this many days
    #[serde(default = "default_renewal_days")]
    pub renewal_days: u32,
}

impl Default for SelfSignedCertificateSpec {
    fn default() -> Self {
        Self {
            alt_names: Vec::new(),
            alt_ips: Vec::new(),
            key_size: DEFAULT_KEY_SIZE,
            validity_days: DEFAULT_VALIDITY_DAYS,
            renewal_days: DEFAULT_RENEWAL_DAYS,
        }
    }
}

fn default_key_size() -> u32 {
    DEFAULT_KEY_SIZE
}

fn default_validity_days() -> u32 {
    DEFAULT_VALIDITY_DAYS
}

fn default_renewal_days() -> u32 {
    DEFAULT_RENEWAL_DAYS
}
