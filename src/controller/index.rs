//! # Dependency Index
//!
//! Secondary index from the identity of a referenced object to the Kibana
//! instances that reference it. References are plain identities: the
//! referenced object is never owned and its lifecycle is independent.
//!
//! One extractor per reference field is registered when the index is created.
//! The index lives for the whole process and is kept current by the Kibana
//! watcher and by every reconcile (see [`DependencyIndex::upsert`]).

use crate::controller::builders::{managed_elasticsearch, serving_secret_name};
use crate::crd::Kibana;
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

/// Reference fields indexed for the watch router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexField {
    /// `spec.elasticsearchRef.managed`
    ElasticsearchRef,
    /// `spec.tls.certificateSecretRef`
    TlsCertificateSecret,
    /// `spec.keystoreSecretRef`
    KeystoreSecret,
    /// `spec.elasticsearchRef.caSecretRef`
    ElasticsearchCaSecret,
    /// `spec.elasticsearchRef.secretRef`
    ElasticsearchCredentialSecret,
    /// `spec.deployment.env[].valueFrom.secretKeyRef` and `envFrom[].secretRef`
    EnvSecret,
    /// `spec.deployment.env[].valueFrom.configMapKeyRef` and `envFrom[].configMapRef`
    EnvConfigMap,
}

impl IndexField {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexField::ElasticsearchRef => "spec.elasticsearchRef.managed",
            IndexField::TlsCertificateSecret => "spec.tls.certificateSecretRef",
            IndexField::KeystoreSecret => "spec.keystoreSecretRef",
            IndexField::ElasticsearchCaSecret => "spec.elasticsearchRef.caSecretRef",
            IndexField::ElasticsearchCredentialSecret => "spec.elasticsearchRef.secretRef",
            IndexField::EnvSecret => "spec.deployment.env.secret",
            IndexField::EnvConfigMap => "spec.deployment.env.configMap",
        }
    }

    /// Fields whose values are Secret identities
    pub const SECRET_FIELDS: [IndexField; 4] = [
        IndexField::TlsCertificateSecret,
        IndexField::KeystoreSecret,
        IndexField::ElasticsearchCaSecret,
        IndexField::ElasticsearchCredentialSecret,
    ];
}

type Extractor = fn(&Kibana) -> Vec<String>;

/// `namespace/name`
#[must_use]
pub fn identity(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

fn local(kibana: &Kibana, name: &str) -> String {
    identity(kibana.instance_namespace(), name)
}

fn extract_elasticsearch(kibana: &Kibana) -> Vec<String> {
    managed_elasticsearch(kibana)
        .map(|(name, namespace)| identity(&namespace, &name))
        .into_iter()
        .collect()
}

fn extract_tls_certificate(kibana: &Kibana) -> Vec<String> {
    // only a user supplied secret; the generated one is owned
    kibana
        .spec
        .tls
        .certificate_secret_ref
        .as_ref()
        .and_then(|_| serving_secret_name(kibana))
        .map(|name| local(kibana, &name))
        .into_iter()
        .collect()
}

fn extract_keystore(kibana: &Kibana) -> Vec<String> {
    kibana
        .spec
        .keystore_secret_ref
        .iter()
        .map(|r| local(kibana, &r.name))
        .collect()
}

fn extract_elasticsearch_ca(kibana: &Kibana) -> Vec<String> {
    kibana
        .spec
        .elasticsearch_ref
        .iter()
        .filter_map(|r| r.ca_secret_ref.as_ref())
        .map(|r| local(kibana, &r.name))
        .collect()
}

fn extract_elasticsearch_credential(kibana: &Kibana) -> Vec<String> {
    kibana
        .spec
        .elasticsearch_ref
        .iter()
        .filter_map(|r| r.secret_ref.as_ref())
        .map(|r| local(kibana, &r.name))
        .collect()
}

fn extract_env_secrets(kibana: &Kibana) -> Vec<String> {
    let policy = &kibana.spec.deployment;
    let from_env = policy
        .env
        .iter()
        .filter_map(|v| v.value_from.as_ref()?.secret_key_ref.as_ref())
        .map(|s| s.name.as_str());
    let from_env_from = policy
        .env_from
        .iter()
        .filter_map(|s| s.secret_ref.as_ref())
        .map(|s| s.name.as_str());
    from_env
        .chain(from_env_from)
        .map(|name| local(kibana, name))
        .collect()
}

fn extract_env_config_maps(kibana: &Kibana) -> Vec<String> {
    let policy = &kibana.spec.deployment;
    let from_env = policy
        .env
        .iter()
        .filter_map(|v| v.value_from.as_ref()?.config_map_key_ref.as_ref())
        .map(|s| s.name.as_str());
    let from_env_from = policy
        .env_from
        .iter()
        .filter_map(|s| s.config_map_ref.as_ref())
        .map(|s| s.name.as_str());
    from_env
        .chain(from_env_from)
        .map(|name| local(kibana, name))
        .collect()
}

#[derive(Debug, Default)]
struct Entries {
    /// `(field, referenced identity)` → Kibana identities
    by_value: HashMap<(IndexField, String), BTreeSet<String>>,
    /// Kibana identity → keys it currently occupies
    by_instance: HashMap<String, Vec<(IndexField, String)>>,
}

impl Entries {
    fn remove(&mut self, instance: &str) {
        let Some(keys) = self.by_instance.remove(instance) else {
            return;
        };
        for key in keys {
            if let Some(set) = self.by_value.get_mut(&key) {
                set.remove(instance);
                if set.is_empty() {
                    self.by_value.remove(&key);
                }
            }
        }
    }
}

/// Process wide dependency index
pub struct DependencyIndex {
    extractors: Vec<(IndexField, Extractor)>,
    entries: RwLock<Entries>,
}

impl std::fmt::Debug for DependencyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyIndex")
            .field(
                "fields",
                &self.extractors.iter().map(|(f, _)| f.as_str()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Default for DependencyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyIndex {
    /// Index with every reference field registered
    #[must_use]
    pub fn new() -> Self {
        let extractors: Vec<(IndexField, Extractor)> = vec![
            (IndexField::ElasticsearchRef, extract_elasticsearch),
            (IndexField::TlsCertificateSecret, extract_tls_certificate),
            (IndexField::KeystoreSecret, extract_keystore),
            (IndexField::ElasticsearchCaSecret, extract_elasticsearch_ca),
            (
                IndexField::ElasticsearchCredentialSecret,
                extract_elasticsearch_credential,
            ),
            (IndexField::EnvSecret, extract_env_secrets),
            (IndexField::EnvConfigMap, extract_env_config_maps),
        ];
        Self {
            extractors,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Replace every entry of `kibana` with its current references
    pub fn upsert(&self, kibana: &Kibana) {
        let instance = kibana.identity();
        let mut keys: Vec<(IndexField, String)> = self
            .extractors
            .iter()
            .flat_map(|(field, extract)| extract(kibana).into_iter().map(|v| (*field, v)))
            .collect();
        keys.sort();
        keys.dedup();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&instance);
        for key in &keys {
            entries
                .by_value
                .entry(key.clone())
                .or_default()
                .insert(instance.clone());
        }
        if !keys.is_empty() {
            entries.by_instance.insert(instance, keys);
        }
    }

    /// Drop every entry of a deleted instance
    pub fn remove(&self, instance: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(instance);
    }

    /// Instances whose `field` references `value` (`namespace/name`)
    #[must_use]
    pub fn lookup(&self, field: IndexField, value: &str) -> BTreeSet<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_value
            .get(&(field, value.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn lookup_any(&self, fields: &[IndexField], value: &str) -> BTreeSet<String> {
        fields
            .iter()
            .flat_map(|field| self.lookup(*field, value))
            .collect()
    }

    /// Instances affected by a change of the Secret `namespace/name`
    ///
    /// Secrets owned by a managed backing cluster (`<es>-tls-api-es`,
    /// `<es>-credential-es`) resolve through the backing cluster reference.
    #[must_use]
    pub fn dependents_of_secret(&self, namespace: &str, name: &str) -> BTreeSet<String> {
        let mut fields = IndexField::SECRET_FIELDS.to_vec();
        fields.push(IndexField::EnvSecret);
        let mut found = self.lookup_any(&fields, &identity(namespace, name));

        let cluster = name
            .strip_suffix("-tls-api-es")
            .or_else(|| name.strip_suffix("-credential-es"));
        if let Some(cluster) = cluster {
            found.extend(self.lookup(IndexField::ElasticsearchRef, &identity(namespace, cluster)));
        }
        found
    }

    /// Instances affected by a change of the ConfigMap `namespace/name`
    #[must_use]
    pub fn dependents_of_config_map(&self, namespace: &str, name: &str) -> BTreeSet<String> {
        self.lookup(IndexField::EnvConfigMap, &identity(namespace, name))
    }

    /// Instances backed by the managed Elasticsearch `namespace/name`
    #[must_use]
    pub fn dependents_of_elasticsearch(&self, namespace: &str, name: &str) -> BTreeSet<String> {
        self.lookup(IndexField::ElasticsearchRef, &identity(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use crate::crd::{ManagedElasticsearchRef, SecretRef};
    use k8s_openapi::api::core::v1::{ConfigMapEnvSource, EnvFromSource};

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_backing_cluster_secrets_resolve_through_reference() {
        let index = DependencyIndex::new();
        index.upsert(&fixtures::kibana());

        assert_eq!(
            index.dependents_of_elasticsearch("observability", "es"),
            set(&["observability/logs"])
        );
        assert_eq!(
            index.dependents_of_secret("observability", "es-credential-es"),
            set(&["observability/logs"])
        );
        assert_eq!(
            index.dependents_of_secret("observability", "es-tls-api-es"),
            set(&["observability/logs"])
        );
        assert!(index.dependents_of_secret("other", "es-tls-api-es").is_empty());
    }

    #[test]
    fn test_upsert_replaces_stale_references() {
        let index = DependencyIndex::new();
        let mut kibana = fixtures::kibana();
        kibana.spec.keystore_secret_ref = Some(SecretRef {
            name: "old".to_string(),
        });
        index.upsert(&kibana);
        assert_eq!(
            index.lookup(IndexField::KeystoreSecret, "observability/old"),
            set(&["observability/logs"])
        );

        kibana.spec.keystore_secret_ref = Some(SecretRef {
            name: "new".to_string(),
        });
        if let Some(reference) = kibana.spec.elasticsearch_ref.as_mut() {
            reference.managed = Some(ManagedElasticsearchRef {
                name: "es".to_string(),
                namespace: Some("search".to_string()),
            });
        }
        index.upsert(&kibana);

        assert!(index.lookup(IndexField::KeystoreSecret, "observability/old").is_empty());
        assert_eq!(
            index.dependents_of_secret("observability", "new"),
            set(&["observability/logs"])
        );
        assert_eq!(
            index.dependents_of_elasticsearch("search", "es"),
            set(&["observability/logs"])
        );
        assert!(index.dependents_of_elasticsearch("observability", "es").is_empty());
    }

    #[test]
    fn test_remove_and_shared_references() {
        let index = DependencyIndex::new();
        let mut first = fixtures::kibana();
        first.spec.deployment.env_from = vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: "shared".to_string(),
                optional: None,
            }),
            ..EnvFromSource::default()
        }];
        let mut second = first.clone();
        second.metadata.name = Some("audit".to_string());

        index.upsert(&first);
        index.upsert(&second);
        assert_eq!(
            index.dependents_of_config_map("observability", "shared"),
            set(&["observability/audit", "observability/logs"])
        );

        index.remove("observability/logs");
        assert_eq!(
            index.dependents_of_config_map("observability", "shared"),
            set(&["observability/audit"])
        );
    }

    #[test]
    fn test_generated_certificate_is_not_indexed() {
        let index = DependencyIndex::new();
        index.upsert(&fixtures::kibana());
        assert!(index.dependents_of_secret("observability", "logs-tls-kb").is_empty());
    }
}
