//! # Checksum Tracker
//!
//! Couples the content of every ConfigMap and Secret the Kibana pods consume to
//! the pod template. Each source is hashed and the hash lands in a pod template
//! annotation, so an edit of the source becomes a template change and the
//! Deployment rolls.
//!
//! Hashes are sha256 over the sorted `key \0 value \0` sequence, rendered as
//! lowercase hex.

use crate::constants::DOMAIN;
use crate::crd::Kibana;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Operator managed source kinds, one annotation each
pub const CONFIG_SOURCE: &str = "config";
pub const TLS_SOURCE: &str = "tls";
pub const CREDENTIAL_SOURCE: &str = "credential";
pub const CA_ELASTICSEARCH_SOURCE: &str = "ca-es";

/// `<domain>/checksum-<source>`
#[must_use]
pub fn checksum_annotation(source: &str) -> String {
    format!("{DOMAIN}/checksum-{source}")
}

/// `<domain>/secret-<name>`
#[must_use]
pub fn secret_annotation(name: &str) -> String {
    format!("{DOMAIN}/secret-{name}")
}

/// `<domain>/configmap-<name>`
#[must_use]
pub fn config_map_annotation(name: &str) -> String {
    format!("{DOMAIN}/configmap-{name}")
}

fn digest<'a>(entries: impl Iterator<Item = (&'a str, &'a [u8])>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update(key.as_bytes());
        hasher.update([0]);
        hasher.update(value);
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}

/// Hash of a ConfigMap's `data` and `binaryData`
#[must_use]
pub fn config_map_checksum(config_map: &ConfigMap) -> String {
    let mut entries: BTreeMap<&str, &[u8]> = BTreeMap::new();
    if let Some(data) = &config_map.data {
        entries.extend(data.iter().map(|(k, v)| (k.as_str(), v.as_bytes())));
    }
    if let Some(data) = &config_map.binary_data {
        entries.extend(data.iter().map(|(k, v)| (k.as_str(), v.0.as_slice())));
    }
    digest(entries.into_iter())
}

/// Hash of a Secret's `data` and `stringData`
#[must_use]
pub fn secret_checksum(secret: &Secret) -> String {
    let mut entries: BTreeMap<&str, &[u8]> = BTreeMap::new();
    if let Some(data) = &secret.data {
        entries.extend(data.iter().map(|(k, v)| (k.as_str(), v.0.as_slice())));
    }
    if let Some(data) = &secret.string_data {
        entries.extend(data.iter().map(|(k, v)| (k.as_str(), v.as_bytes())));
    }
    digest(entries.into_iter())
}

/// Hash of raw secret data, for secrets the operator builds itself
#[must_use]
pub fn data_checksum(data: &BTreeMap<String, ByteString>) -> String {
    digest(data.iter().map(|(k, v)| (k.as_str(), v.0.as_slice())))
}

/// Kind of a user referenced source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    Secret,
    ConfigMap,
}

impl SourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Secret => "Secret",
            SourceKind::ConfigMap => "ConfigMap",
        }
    }

    /// Annotation key for a source of this kind
    #[must_use]
    pub fn annotation(&self, name: &str) -> String {
        match self {
            SourceKind::Secret => secret_annotation(name),
            SourceKind::ConfigMap => config_map_annotation(name),
        }
    }
}

/// User referenced ConfigMap or Secret in the instance namespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub name: String,
    /// Missing optional sources are skipped instead of waited for
    pub optional: bool,
}

/// Every user ConfigMap and Secret the Kibana pods read
///
/// Covers the keystore secret, external backing cluster credentials and CA,
/// and `env`/`envFrom` indirections. Operator managed sources are tracked by
/// their phases under [`checksum_annotation`]. A source referenced several
/// times is optional only when every reference is.
#[must_use]
pub fn references(kibana: &Kibana) -> Vec<SourceRef> {
    let mut found: BTreeMap<(SourceKind, String), bool> = BTreeMap::new();
    let mut add = |kind: SourceKind, name: &str, optional: bool| {
        found
            .entry((kind, name.to_string()))
            .and_modify(|o| *o = *o && optional)
            .or_insert(optional);
    };

    if let Some(keystore) = &kibana.spec.keystore_secret_ref {
        add(SourceKind::Secret, &keystore.name, false);
    }
    if let Some(reference) = &kibana.spec.elasticsearch_ref {
        if reference.is_external() {
            if let Some(secret) = &reference.secret_ref {
                add(SourceKind::Secret, &secret.name, false);
            }
            if let Some(secret) = &reference.ca_secret_ref {
                add(SourceKind::Secret, &secret.name, false);
            }
        }
    }

    let policy = &kibana.spec.deployment;
    for var in &policy.env {
        let Some(source) = &var.value_from else {
            continue;
        };
        if let Some(selector) = &source.secret_key_ref {
            add(
                SourceKind::Secret,
                &selector.name,
                selector.optional.unwrap_or(false),
            );
        }
        if let Some(selector) = &source.config_map_key_ref {
            add(
                SourceKind::ConfigMap,
                &selector.name,
                selector.optional.unwrap_or(false),
            );
        }
    }
    for source in &policy.env_from {
        if let Some(secret) = &source.secret_ref {
            add(SourceKind::Secret, &secret.name, secret.optional.unwrap_or(false));
        }
        if let Some(config_map) = &source.config_map_ref {
            add(
                SourceKind::ConfigMap,
                &config_map.name,
                config_map.optional.unwrap_or(false),
            );
        }
    }

    found
        .into_iter()
        .map(|((kind, name), optional)| SourceRef {
            kind,
            name,
            optional,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use crate::crd::SecretRef;
    use k8s_openapi::api::core::v1::{
        ConfigMapEnvSource, EnvFromSource, EnvVar, EnvVarSource, SecretKeySelector,
    };

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..ConfigMap::default()
        }
    }

    #[test]
    fn test_checksum_changes_only_with_data() {
        let before = config_map(&[("kibana.yml", "a: 1"), ("extra.yml", "b: 2")]);
        let reordered = config_map(&[("extra.yml", "b: 2"), ("kibana.yml", "a: 1")]);
        let mut relabelled = before.clone();
        relabelled.metadata.labels = Some(BTreeMap::from([("x".into(), "y".into())]));
        let edited = config_map(&[("kibana.yml", "a: 2"), ("extra.yml", "b: 2")]);

        assert_eq!(config_map_checksum(&before), config_map_checksum(&reordered));
        assert_eq!(config_map_checksum(&before), config_map_checksum(&relabelled));
        assert_ne!(config_map_checksum(&before), config_map_checksum(&edited));
    }

    #[test]
    fn test_key_value_boundaries_are_hashed() {
        // "ab" => "c" and "a" => "bc" must not collide
        let left = config_map(&[("ab", "c")]);
        let right = config_map(&[("a", "bc")]);
        assert_ne!(config_map_checksum(&left), config_map_checksum(&right));
    }

    #[test]
    fn test_secret_and_raw_data_agree() {
        let data = BTreeMap::from([("password".to_string(), ByteString(b"s3cr3t".to_vec()))]);
        let secret = Secret {
            data: Some(data.clone()),
            ..Secret::default()
        };
        assert_eq!(secret_checksum(&secret), data_checksum(&data));
        assert_eq!(data_checksum(&data).len(), 64);
    }

    #[test]
    fn test_annotation_keys() {
        assert_eq!(
            checksum_annotation(CONFIG_SOURCE),
            "kibana.k8s.webcenter.fr/checksum-config"
        );
        assert_eq!(
            SourceKind::ConfigMap.annotation("settings"),
            "kibana.k8s.webcenter.fr/configmap-settings"
        );
        assert_eq!(
            SourceKind::Secret.annotation("creds"),
            "kibana.k8s.webcenter.fr/secret-creds"
        );
    }

    #[test]
    fn test_references_follow_env_indirection() {
        let mut kibana = fixtures::kibana();
        kibana.spec.keystore_secret_ref = Some(SecretRef {
            name: "keystore".to_string(),
        });
        kibana.spec.deployment.env = vec![
            EnvVar {
                name: "TOKEN".to_string(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: "keystore".to_string(),
                        key: "token".to_string(),
                        optional: Some(true),
                    }),
                    ..EnvVarSource::default()
                }),
                ..EnvVar::default()
            },
            EnvVar {
                name: "PLAIN".to_string(),
                value: Some("x".to_string()),
                ..EnvVar::default()
            },
        ];
        kibana.spec.deployment.env_from = vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: "settings".to_string(),
                optional: Some(true),
            }),
            ..EnvFromSource::default()
        }];

        let refs = references(&kibana);
        assert_eq!(
            refs,
            vec![
                SourceRef {
                    kind: SourceKind::Secret,
                    name: "keystore".to_string(),
                    optional: false,
                },
                SourceRef {
                    kind: SourceKind::ConfigMap,
                    name: "settings".to_string(),
                    optional: true,
                },
            ]
        );
    }
}
