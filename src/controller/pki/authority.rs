//! Root CA generation and leaf issuance.

use super::{PkiError, Result};
use crate::crd::Kibana;
use chrono::{DateTime, Utc};
use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, CertificateRevocationListParams,
    DistinguishedName, DnType, DnValue, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyIdMethod,
    KeyPair, KeyUsagePurpose, RsaKeySize, SanType, SerialNumber,
};
use zeroize::Zeroizing;

/// Self-signed certificate settings resolved from the Kibana spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiSettings {
    pub common_name: String,
    pub key_size: u32,
    pub validity_days: u32,
    pub renewal_days: u32,
    /// DNS names and IP addresses of the leaf certificate
    pub sans: Vec<String>,
}

impl PkiSettings {
    /// Settings for a Kibana instance
    #[must_use]
    pub fn for_kibana(kibana: &Kibana) -> Self {
        let self_signed = kibana.spec.tls.self_signed();
        let mut sans = service_dns_names(kibana);
        sans.extend(self_signed.alt_names.iter().cloned());
        sans.extend(self_signed.alt_ips.iter().cloned());

        Self {
            common_name: kibana.instance_name().to_string(),
            key_size: self_signed.key_size,
            validity_days: self_signed.validity_days,
            renewal_days: self_signed.renewal_days,
            sans,
        }
    }

    #[must_use]
    pub fn renewal_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.renewal_days))
    }
}

/// The three canonical in-cluster names of the Kibana service
#[must_use]
pub fn service_dns_names(kibana: &Kibana) -> Vec<String> {
    let service = crate::controller::builders::workload_name(kibana);
    let namespace = kibana.instance_namespace();
    vec![
        service.clone(),
        format!("{service}.{namespace}"),
        format!("{service}.{namespace}.svc"),
    ]
}

/// CA and leaf material of one instance
#[derive(Clone, PartialEq, Eq)]
pub struct PkiMaterial {
    pub ca_cert: String,
    pub ca_key: Zeroizing<String>,
    pub ca_crl: String,
    pub tls_cert: String,
    pub tls_key: Zeroizing<String>,
}

impl std::fmt::Debug for PkiMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkiMaterial")
            .field("ca_cert", &self.ca_cert.len())
            .field("ca_key", &"***")
            .field("tls_cert", &self.tls_cert.len())
            .field("tls_key", &"***")
            .finish_non_exhaustive()
    }
}

/// Generate a fresh root CA, its revocation list and one leaf certificate
///
/// `now` is the start of validity for every generated artifact.
pub fn generate(settings: &PkiSettings, now: DateTime<Utc>) -> Result<PkiMaterial> {
    let (not_before, not_after) = compute_validity(now, settings.validity_days)?;

    let ca_key = generate_key(settings.key_size)?;
    let mut ca_params = CertificateParams::default();
    ca_params.distinguished_name = distinguished_name(&format!("{} CA", settings.common_name));
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    ca_params.not_before = not_before;
    ca_params.not_after = not_after;

    let ca_cert = ca_params.self_signed(&ca_key).map_err(|e| {
        PkiError::CertificateGenerationFailed(format!("failed to create CA cert: {e}"))
    })?;
    let ca_cert_pem = ca_cert.pem();

    let issuer = Issuer::from_ca_cert_pem(&ca_cert_pem, &ca_key)
        .map_err(|e| PkiError::ParseError(format!("failed to create issuer: {e}")))?;

    let crl = CertificateRevocationListParams {
        this_update: not_before,
        next_update: not_after,
        crl_number: SerialNumber::from_slice(&[1]),
        issuing_distribution_point: None,
        revoked_certs: Vec::new(),
        key_identifier_method: KeyIdMethod::Sha256,
    }
    .signed_by(&issuer)
    .map_err(|e| PkiError::CertificateGenerationFailed(format!("failed to sign CRL: {e}")))?;
    let ca_crl_pem = crl
        .pem()
        .map_err(|e| PkiError::CertificateGenerationFailed(format!("failed to encode CRL: {e}")))?;

    let mut leaf_params = CertificateParams::default();
    leaf_params.distinguished_name = distinguished_name(&settings.common_name);
    leaf_params.is_ca = IsCa::NoCa;
    leaf_params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    leaf_params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];
    leaf_params.not_before = not_before;
    leaf_params.not_after = not_after;
    leaf_params.subject_alt_names = settings
        .sans
        .iter()
        .map(|san| san_type(san))
        .collect::<Result<Vec<_>>>()?;

    let leaf_key = generate_key(settings.key_size)?;
    let leaf_cert = leaf_params.signed_by(&leaf_key, &issuer).map_err(|e| {
        PkiError::CertificateGenerationFailed(format!("failed to sign leaf cert: {e}"))
    })?;

    Ok(PkiMaterial {
        ca_cert: ca_cert_pem,
        ca_key: Zeroizing::new(ca_key.serialize_pem()),
        ca_crl: ca_crl_pem,
        tls_cert: leaf_cert.pem(),
        tls_key: Zeroizing::new(leaf_key.serialize_pem()),
    })
}

fn generate_key(key_size: u32) -> Result<KeyPair> {
    let size = match key_size {
        2048 => RsaKeySize::_2048,
        3072 => RsaKeySize::_3072,
        4096 => RsaKeySize::_4096,
        other => return Err(PkiError::UnsupportedKeySize(other)),
    };
    KeyPair::generate_rsa_for(&rcgen::PKCS_RSA_SHA256, size)
        .map_err(|e| PkiError::KeyGenerationFailed(format!("failed to generate RSA key: {e}")))
}

fn compute_validity(
    now: DateTime<Utc>,
    days: u32,
) -> Result<(::time::OffsetDateTime, ::time::OffsetDateTime)> {
    let not_before = ::time::OffsetDateTime::from_unix_timestamp(now.timestamp())
        .map_err(|e| PkiError::CertificateGenerationFailed(format!("invalid start time: {e}")))?;
    let not_after = not_before + ::time::Duration::days(i64::from(days));
    Ok((not_before, not_after))
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(common_name.to_string()),
    );
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String("Kibana operator".to_string()),
    );
    dn
}

fn san_type(san: &str) -> Result<SanType> {
    if let Ok(ip) = san.parse::<std::net::IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    Ia5String::try_from(san.to_string())
        .map(SanType::DnsName)
        .map_err(|e| {
            PkiError::CertificateGenerationFailed(format!("invalid DNS name '{san}': {e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::pki::{subject_alt_names, CertificateInfo};
    use chrono::TimeZone;

    fn settings() -> PkiSettings {
        PkiSettings {
            common_name: "logs".to_string(),
            key_size: 2048,
            validity_days: 365,
            renewal_days: 30,
            sans: vec![
                "logs-kb".to_string(),
                "logs-kb.observability".to_string(),
                "logs-kb.observability.svc".to_string(),
                "10.0.0.1".to_string(),
            ],
        }
    }

    #[test]
    fn test_generate_produces_chain_and_crl() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let material = generate(&settings(), now).unwrap();

        assert!(material.ca_cert.contains("BEGIN CERTIFICATE"));
        assert!(material.tls_cert.contains("BEGIN CERTIFICATE"));
        assert!(material.ca_crl.contains("BEGIN X509 CRL"));
        assert!(material.ca_key.contains("PRIVATE KEY"));
        assert!(material.tls_key.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_generate_sets_validity_from_now() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let material = generate(&settings(), now).unwrap();

        let info = CertificateInfo::from_pem(&material.tls_cert).unwrap();
        assert_eq!(info.not_before, now);
        assert_eq!(info.not_after, now + chrono::Duration::days(365));
    }

    #[test]
    fn test_leaf_carries_service_names_and_ips() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let material = generate(&settings(), now).unwrap();

        let sans = subject_alt_names(&material.tls_cert).unwrap();
        assert!(sans.contains(&"logs-kb".to_string()));
        assert!(sans.contains(&"logs-kb.observability.svc".to_string()));
        assert!(sans.contains(&"10.0.0.1".to_string()));
    }

    #[test]
    fn test_unsupported_key_size_is_rejected() {
        let mut settings = settings();
        settings.key_size = 1024;
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            generate(&settings, now),
            Err(PkiError::UnsupportedKeySize(1024))
        ));
    }
}
