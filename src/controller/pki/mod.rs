//! # Certificate Authority Manager
//!
//! Per-instance PKI for the Kibana HTTP endpoint.
//!
//! Each Kibana instance with TLS enabled and no user supplied certificate gets
//! its own self-signed root CA and one leaf certificate issued from it. Both are
//! persisted in opaque secrets (`<instance>-pki-kb` and `<instance>-tls-kb`)
//! and reloaded from the store on every reconcile; key material is never cached
//! in the process.
//!
//! ## Lifecycle
//!
//! `Absent → Generated → Valid → NearExpiry → Regenerated`
//!
//! Renewal replaces the whole chain: when the CA or the leaf enters the renewal
//! window, or when only one of the two secrets exists, both are regenerated in
//! the same pass.

mod authority;
mod lifecycle;

pub use authority::{generate, service_dns_names, PkiMaterial, PkiSettings};
pub use lifecycle::{evaluate, CaState, CaTransition, CertificateAuthorityManager};

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use x509_parser::prelude::*;

/// Keys of the CA secret
pub const CA_CERT_KEY: &str = "ca.crt";
pub const CA_KEY_KEY: &str = "ca.key";
pub const CA_CRL_KEY: &str = "ca.crl";

/// Keys of the leaf certificate secret
pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_KEY_KEY: &str = "tls.key";

/// PKI errors
#[derive(Debug, Error)]
pub enum PkiError {
    /// Key size outside 2048/3072/4096
    #[error("unsupported RSA key size {0}")]
    UnsupportedKeySize(u32),

    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Certificate generation failed
    #[error("certificate generation failed: {0}")]
    CertificateGenerationFailed(String),

    /// Certificate parsing error
    #[error("certificate parsing error: {0}")]
    ParseError(String),

    /// Secret exists but lacks a required key
    #[error("secret {secret} has no key {key}")]
    MissingKey { secret: String, key: String },
}

/// Result type for PKI operations
pub type Result<T> = std::result::Result<T, PkiError>;

/// Validity window of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateInfo {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateInfo {
    /// Parse certificate info from PEM-encoded certificate
    pub fn from_pem(pem_data: &str) -> Result<Self> {
        let der = parse_pem(pem_data)?;
        Self::from_der(&der)
    }

    /// Parse certificate info from DER-encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| PkiError::ParseError(format!("failed to parse certificate: {e}")))?;

        Ok(Self {
            not_before: timestamp(cert.validity().not_before.timestamp())?,
            not_after: timestamp(cert.validity().not_after.timestamp())?,
        })
    }

    /// Whether `now` falls in the renewal window
    ///
    /// Due exactly when `now >= not_after - renewal`.
    #[must_use]
    pub fn renewal_due(&self, now: DateTime<Utc>, renewal: chrono::Duration) -> bool {
        now >= self.not_after - renewal
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| PkiError::ParseError(format!("timestamp {secs} out of range")))
}

/// Parse PEM-encoded data and return the DER bytes
pub fn parse_pem(pem_data: &str) -> Result<Vec<u8>> {
    let pem_obj = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| PkiError::ParseError(format!("failed to parse PEM: {e}")))?;
    Ok(pem_obj.contents().to_vec())
}

/// DNS and IP subject alternative names of a certificate
pub fn subject_alt_names(pem_data: &str) -> Result<Vec<String>> {
    let der = parse_pem(pem_data)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| PkiError::ParseError(format!("failed to parse certificate: {e}")))?;

    let mut names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => names.push((*dns).to_string()),
                GeneralName::IPAddress(bytes) => match bytes.len() {
                    4 => {
                        let octets: [u8; 4] = [bytes[0], bytes[1], bytes[2], bytes[3]];
                        names.push(std::net::Ipv4Addr::from(octets).to_string());
                    }
                    16 => {
                        let mut octets = [0_u8; 16];
                        octets.copy_from_slice(bytes);
                        names.push(std::net::Ipv6Addr::from(octets).to_string());
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }
    Ok(names)
}
