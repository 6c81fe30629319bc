//! Renewal state machine of the per-instance CA.

use super::{
    generate, subject_alt_names, CertificateInfo, PkiError, PkiMaterial, PkiSettings, Result,
    CA_CERT_KEY, CA_CRL_KEY, CA_KEY_KEY, TLS_CERT_KEY, TLS_KEY_KEY,
};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use std::net::IpAddr;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// State of the stored CA and leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaState {
    /// Neither secret exists
    Absent,
    /// One secret exists without the other
    Incomplete,
    /// CA or leaf is inside the renewal window
    NearExpiry,
    /// Both secrets exist and are outside the renewal window
    Valid(PkiMaterial),
}

/// What the manager did during one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaTransition {
    Generated,
    Valid,
    Regenerated,
}

impl CaTransition {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CaTransition::Generated => "generated",
            CaTransition::Valid => "valid",
            CaTransition::Regenerated => "regenerated",
        }
    }
}

/// Classify the stored material
///
/// Unparseable certificates are an error rather than a renewal trigger.
pub fn evaluate(
    pki_secret: Option<&Secret>,
    tls_secret: Option<&Secret>,
    renewal: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<CaState> {
    let (pki_secret, tls_secret) = match (pki_secret, tls_secret) {
        (None, None) => return Ok(CaState::Absent),
        (Some(pki), Some(tls)) => (pki, tls),
        _ => return Ok(CaState::Incomplete),
    };

    let material = PkiMaterial {
        ca_cert: secret_string(pki_secret, CA_CERT_KEY)?,
        ca_key: Zeroizing::new(secret_string(pki_secret, CA_KEY_KEY)?),
        ca_crl: secret_string(pki_secret, CA_CRL_KEY)?,
        tls_cert: secret_string(tls_secret, TLS_CERT_KEY)?,
        tls_key: Zeroizing::new(secret_string(tls_secret, TLS_KEY_KEY)?),
    };

    let ca = CertificateInfo::from_pem(&material.ca_cert)?;
    let leaf = CertificateInfo::from_pem(&material.tls_cert)?;
    if ca.renewal_due(now, renewal) || leaf.renewal_due(now, renewal) {
        debug!(
            ca.not_after = %ca.not_after,
            leaf.not_after = %leaf.not_after,
            "certificate inside renewal window"
        );
        return Ok(CaState::NearExpiry);
    }

    Ok(CaState::Valid(material))
}

fn secret_string(secret: &Secret, key: &str) -> Result<String> {
    let missing = || PkiError::MissingKey {
        secret: secret.metadata.name.clone().unwrap_or_default(),
        key: key.to_string(),
    };
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(missing)?;
    String::from_utf8(bytes.0.clone())
        .map_err(|e| PkiError::ParseError(format!("{key} is not UTF-8: {e}")))
}

/// Drives the CA state machine for one instance
#[derive(Debug, Clone)]
pub struct CertificateAuthorityManager {
    settings: PkiSettings,
}

impl CertificateAuthorityManager {
    #[must_use]
    pub fn new(settings: PkiSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &PkiSettings {
        &self.settings
    }

    /// Return the material to persist for this pass
    ///
    /// Valid material is returned untouched so the secrets only diff on
    /// metadata drift. Any other state regenerates CA and leaf together.
    pub fn ensure(
        &self,
        pki_secret: Option<&Secret>,
        tls_secret: Option<&Secret>,
        now: DateTime<Utc>,
    ) -> Result<(PkiMaterial, CaTransition)> {
        let state = evaluate(pki_secret, tls_secret, self.settings.renewal_window(), now)?;
        let transition = match state {
            CaState::Valid(material) if self.covers_sans(&material)? => {
                return Ok((material, CaTransition::Valid));
            }
            CaState::Absent => CaTransition::Generated,
            CaState::Valid(_) | CaState::Incomplete | CaState::NearExpiry => {
                CaTransition::Regenerated
            }
        };

        info!(
            common_name = self.settings.common_name.as_str(),
            key_size = self.settings.key_size,
            validity_days = self.settings.validity_days,
            transition = transition.as_str(),
            "generating certificate authority"
        );
        let material = generate(&self.settings, now)?;
        Ok((material, transition))
    }

    /// Whether the stored leaf carries every configured SAN
    fn covers_sans(&self, material: &PkiMaterial) -> Result<bool> {
        let present: Vec<String> = subject_alt_names(&material.tls_cert)?
            .iter()
            .map(|san| canonical_san(san))
            .collect();
        let missing: Vec<&String> = self
            .settings
            .sans
            .iter()
            .filter(|san| !present.contains(&canonical_san(san)))
            .collect();
        if !missing.is_empty() {
            debug!(?missing, "leaf certificate lacks subject alternative names");
        }
        Ok(missing.is_empty())
    }
}

/// IP addresses compare by value, names by exact text
fn canonical_san(san: &str) -> String {
    san.parse::<IpAddr>()
        .map_or_else(|_| san.to_string(), |ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn settings() -> PkiSettings {
        PkiSettings {
            common_name: "logs".to_string(),
            key_size: 2048,
            validity_days: 365,
            renewal_days: 30,
            sans: vec!["logs-kb".to_string()],
        }
    }

    fn secrets(material: &PkiMaterial) -> (Secret, Secret) {
        let entry = |k: &str, v: &str| (k.to_string(), ByteString(v.as_bytes().to_vec()));
        let pki = Secret {
            data: Some(BTreeMap::from([
                entry(CA_CERT_KEY, &material.ca_cert),
                entry(CA_KEY_KEY, &material.ca_key),
                entry(CA_CRL_KEY, &material.ca_crl),
            ])),
            ..Default::default()
        };
        let tls = Secret {
            data: Some(BTreeMap::from([
                entry(TLS_CERT_KEY, &material.tls_cert),
                entry(TLS_KEY_KEY, &material.tls_key),
                entry(CA_CERT_KEY, &material.ca_cert),
            ])),
            ..Default::default()
        };
        (pki, tls)
    }

    #[test]
    fn test_absent_generates() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let manager = CertificateAuthorityManager::new(settings());
        let (_, transition) = manager.ensure(None, None, now).unwrap();
        assert_eq!(transition, CaTransition::Generated);
    }

    #[test]
    fn test_renewal_triggers_exactly_at_window_start() {
        let issued = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let manager = CertificateAuthorityManager::new(settings());
        let (material, _) = manager.ensure(None, None, issued).unwrap();
        let (pki, tls) = secrets(&material);

        let window_start = issued + chrono::Duration::days(365 - 30);
        let just_before = window_start - chrono::Duration::seconds(1);

        let before = evaluate(Some(&pki), Some(&tls), manager.settings().renewal_window(), just_before)
            .unwrap();
        assert_eq!(before, CaState::Valid(material.clone()));

        let at = evaluate(Some(&pki), Some(&tls), manager.settings().renewal_window(), window_start)
            .unwrap();
        assert_eq!(at, CaState::NearExpiry);
    }

    #[test]
    fn test_valid_material_is_reused() {
        let issued = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let manager = CertificateAuthorityManager::new(settings());
        let (material, _) = manager.ensure(None, None, issued).unwrap();
        let (pki, tls) = secrets(&material);

        let later = issued + chrono::Duration::days(100);
        let (reused, transition) = manager.ensure(Some(&pki), Some(&tls), later).unwrap();
        assert_eq!(transition, CaTransition::Valid);
        assert_eq!(reused, material);
    }

    #[test]
    fn test_new_alt_name_regenerates() {
        let issued = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let (material, _) = CertificateAuthorityManager::new(settings())
            .ensure(None, None, issued)
            .unwrap();
        let (pki, tls) = secrets(&material);

        let mut widened = settings();
        widened.sans.push("kibana.example.com".to_string());
        widened.sans.push("10.0.0.7".to_string());
        let manager = CertificateAuthorityManager::new(widened);
        let (renewed, transition) = manager.ensure(Some(&pki), Some(&tls), issued).unwrap();
        assert_eq!(transition, CaTransition::Regenerated);

        let (pki, tls) = secrets(&renewed);
        let (_, transition) = manager.ensure(Some(&pki), Some(&tls), issued).unwrap();
        assert_eq!(transition, CaTransition::Valid);
    }

    #[test]
    fn test_one_secret_missing_regenerates_both() {
        let issued = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let manager = CertificateAuthorityManager::new(settings());
        let (material, _) = manager.ensure(None, None, issued).unwrap();
        let (pki, _) = secrets(&material);

        let (renewed, transition) = manager.ensure(Some(&pki), None, issued).unwrap();
        assert_eq!(transition, CaTransition::Regenerated);
        assert_ne!(renewed.ca_cert, material.ca_cert);
        assert_ne!(renewed.tls_cert, material.tls_cert);
    }

    #[test]
    fn test_corrupt_certificate_is_an_error() {
        let pki = Secret {
            data: Some(BTreeMap::from([
                (CA_CERT_KEY.to_string(), ByteString(b"garbage".to_vec())),
                (CA_KEY_KEY.to_string(), ByteString(b"garbage".to_vec())),
                (CA_CRL_KEY.to_string(), ByteString(b"garbage".to_vec())),
            ])),
            ..Default::default()
        };
        let tls = Secret {
            data: Some(BTreeMap::from([
                (TLS_CERT_KEY.to_string(), ByteString(b"garbage".to_vec())),
                (TLS_KEY_KEY.to_string(), ByteString(b"garbage".to_vec())),
            ])),
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(evaluate(Some(&pki), Some(&tls), chrono::Duration::days(30), now).is_err());
    }
}
