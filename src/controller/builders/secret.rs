//! Certificate, mirrored CA and mirrored credential secrets.

use super::{
    ca_elasticsearch_secret_name, credential_secret_name, object_meta, pki_secret_name,
    tls_secret_name, Snapshot,
};
use crate::constants::KIBANA_SYSTEM_USER;
use crate::controller::pki::{
    CA_CERT_KEY, CA_CRL_KEY, CA_KEY_KEY, PkiMaterial, TLS_CERT_KEY, TLS_KEY_KEY,
};
use crate::crd::Kibana;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// Key of the mirrored backing cluster CA
pub const ELASTICSEARCH_CA_KEY: &str = "ca.crt";
/// Keys of the mirrored credential secret
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";

fn bytes(value: &str) -> ByteString {
    ByteString(value.as_bytes().to_vec())
}

fn opaque(kibana: &Kibana, name: String, data: BTreeMap<String, ByteString>) -> Secret {
    Secret {
        metadata: object_meta(kibana, name, &BTreeMap::new(), &BTreeMap::new()),
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Secret::default()
    }
}

/// `<instance>-pki-kb` and `<instance>-tls-kb`
///
/// Empty when TLS is off or the user supplies the certificate.
#[must_use]
pub fn build_pki_secrets(kibana: &Kibana, material: Option<&PkiMaterial>) -> Vec<Secret> {
    let Some(material) = material.filter(|_| kibana.self_signed_tls()) else {
        return Vec::new();
    };

    let pki = opaque(
        kibana,
        pki_secret_name(kibana),
        BTreeMap::from([
            (CA_CERT_KEY.to_string(), bytes(&material.ca_cert)),
            (CA_KEY_KEY.to_string(), bytes(&material.ca_key)),
            (CA_CRL_KEY.to_string(), bytes(&material.ca_crl)),
        ]),
    );
    let tls = opaque(
        kibana,
        tls_secret_name(kibana),
        BTreeMap::from([
            (TLS_CERT_KEY.to_string(), bytes(&material.tls_cert)),
            (TLS_KEY_KEY.to_string(), bytes(&material.tls_key)),
            (CA_CERT_KEY.to_string(), bytes(&material.ca_cert)),
        ]),
    );
    vec![pki, tls]
}

/// `<instance>-ca-es-kb`: copy of `ca.crt` from the backing cluster API certificate
#[must_use]
pub fn build_ca_elasticsearch_secrets(kibana: &Kibana, snapshot: &Snapshot) -> Vec<Secret> {
    let Some(ca) = snapshot.elasticsearch_ca.as_ref().filter(|_| snapshot.elasticsearch_tls())
    else {
        return Vec::new();
    };
    vec![opaque(
        kibana,
        ca_elasticsearch_secret_name(kibana),
        BTreeMap::from([(ELASTICSEARCH_CA_KEY.to_string(), ca.clone())]),
    )]
}

/// `<instance>-credential-kb`: `kibana_system` credentials of the backing cluster
#[must_use]
pub fn build_credential_secrets(kibana: &Kibana, snapshot: &Snapshot) -> Vec<Secret> {
    let Some(password) = snapshot.elasticsearch_password.as_ref() else {
        return Vec::new();
    };
    vec![opaque(
        kibana,
        credential_secret_name(kibana),
        BTreeMap::from([
            (USERNAME_KEY.to_string(), bytes(KIBANA_SYSTEM_USER)),
            (PASSWORD_KEY.to_string(), password.clone()),
        ]),
    )]
}
