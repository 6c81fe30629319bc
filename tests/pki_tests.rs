//! # Certificate Authority Tests
//!
//! Generation, persistence and renewal of the per-instance CA through the
//! secrets the builders produce.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::kibana;
use kibana_operator::controller::builders::build_pki_secrets;
use kibana_operator::controller::pki::{
    evaluate, subject_alt_names, CaState, CaTransition, CertificateAuthorityManager,
    CertificateInfo, PkiSettings,
};

#[test]
fn test_fresh_instance_gets_ca_and_leaf_with_service_names() {
    let kibana = kibana();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let manager = CertificateAuthorityManager::new(PkiSettings::for_kibana(&kibana));

    let (material, transition) = manager.ensure(None, None, now).unwrap();
    assert_eq!(transition, CaTransition::Generated);

    let secrets = build_pki_secrets(&kibana, Some(&material));
    assert_eq!(secrets.len(), 2);
    let pki_keys: Vec<_> = secrets[0].data.as_ref().unwrap().keys().cloned().collect();
    assert_eq!(pki_keys, vec!["ca.crl", "ca.crt", "ca.key"]);
    let tls_keys: Vec<_> = secrets[1].data.as_ref().unwrap().keys().cloned().collect();
    assert_eq!(tls_keys, vec!["ca.crt", "tls.crt", "tls.key"]);

    let sans = subject_alt_names(&material.tls_cert).unwrap();
    for name in ["logs-kb", "logs-kb.observability", "logs-kb.observability.svc"] {
        assert!(sans.contains(&name.to_string()), "missing SAN {name}");
    }

    // Reloaded from the persisted secrets, the same material is kept
    let (reloaded, transition) = manager
        .ensure(Some(&secrets[0]), Some(&secrets[1]), now + Duration::days(1))
        .unwrap();
    assert_eq!(transition, CaTransition::Valid);
    assert_eq!(reloaded, material);
}

#[test]
fn test_renewal_starts_exactly_at_window() {
    let kibana = kibana();
    let issued = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let settings = PkiSettings::for_kibana(&kibana);
    let renewal = settings.renewal_window();
    let manager = CertificateAuthorityManager::new(settings);

    let (material, _) = manager.ensure(None, None, issued).unwrap();
    let secrets = build_pki_secrets(&kibana, Some(&material));
    let (pki, tls) = (Some(&secrets[0]), Some(&secrets[1]));

    let ca = CertificateInfo::from_pem(&material.ca_cert).unwrap();
    let leaf = CertificateInfo::from_pem(&material.tls_cert).unwrap();
    let window_start = ca.not_after.min(leaf.not_after) - renewal;

    let just_before = window_start - Duration::seconds(1);
    assert!(matches!(
        evaluate(pki, tls, renewal, just_before).unwrap(),
        CaState::Valid(_)
    ));
    assert_eq!(
        evaluate(pki, tls, renewal, window_start).unwrap(),
        CaState::NearExpiry
    );

    let (renewed, transition) = manager.ensure(pki, tls, window_start).unwrap();
    assert_eq!(transition, CaTransition::Regenerated);
    assert_ne!(renewed.ca_cert, material.ca_cert);
    assert_ne!(renewed.tls_cert, material.tls_cert);
}
