//! # Watch Router
//!
//! Translates an event on a Secret, ConfigMap or backing cluster into reconcile
//! requests for the Kibana instances depending on it.
//!
//! Referenced objects resolve through the [`DependencyIndex`]. Objects the
//! operator created resolve through their controller owner reference, so
//! drift on a managed secret or config map is repaired as well.

use crate::constants::DOMAIN;
use crate::controller::index::{identity, DependencyIndex};
use crate::controller::reconciler::{forget_backoff, BackoffStates};
use crate::crd::{Elasticsearch, Kibana};
use crate::observability::metrics;
use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube::{Resource, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reference to the instance `namespace/name`
#[must_use]
pub fn instance_ref(identity: &str) -> Option<ObjectRef<Kibana>> {
    let (namespace, name) = identity.split_once('/')?;
    Some(ObjectRef::new(name).within(namespace))
}

/// Identity of the Kibana controlling `object`, if any
fn controlling_instance<K: Resource>(object: &K) -> Option<String> {
    let namespace = object.meta().namespace.as_deref()?;
    object
        .owner_references()
        .iter()
        .find(|owner| {
            owner.controller == Some(true)
                && owner.kind == "Kibana"
                && owner.api_version.starts_with(DOMAIN)
        })
        .map(|owner| identity(namespace, &owner.name))
}

fn to_refs(
    kind: &'static str,
    object: &str,
    instances: BTreeSet<String>,
) -> Vec<ObjectRef<Kibana>> {
    if instances.is_empty() {
        return Vec::new();
    }
    metrics::increment_watch_triggers(kind);
    debug!(
        kind,
        object,
        instances = ?instances,
        "collaborator change routed"
    );
    instances.iter().filter_map(|i| instance_ref(i)).collect()
}

/// Instances to reconcile after a Secret event
#[must_use]
pub fn route_secret(index: &DependencyIndex, secret: &Secret) -> Vec<ObjectRef<Kibana>> {
    let namespace = secret.namespace().unwrap_or_default();
    let name = secret.name_any();
    let mut instances = index.dependents_of_secret(&namespace, &name);
    instances.extend(controlling_instance(secret));
    to_refs("Secret", &identity(&namespace, &name), instances)
}

/// Instances to reconcile after a ConfigMap event
#[must_use]
pub fn route_config_map(
    index: &DependencyIndex,
    config_map: &ConfigMap,
) -> Vec<ObjectRef<Kibana>> {
    let namespace = config_map.namespace().unwrap_or_default();
    let name = config_map.name_any();
    let mut instances = index.dependents_of_config_map(&namespace, &name);
    instances.extend(controlling_instance(config_map));
    to_refs("ConfigMap", &identity(&namespace, &name), instances)
}

/// Instances to reconcile after a backing cluster event
#[must_use]
pub fn route_elasticsearch(
    index: &DependencyIndex,
    elasticsearch: &Elasticsearch,
) -> Vec<ObjectRef<Kibana>> {
    let namespace = elasticsearch.namespace().unwrap_or_default();
    let name = elasticsearch.name_any();
    let instances = index.dependents_of_elasticsearch(&namespace, &name);
    to_refs("Elasticsearch", &identity(&namespace, &name), instances)
}

/// Keep the index current with Kibana creations, edits and deletions
///
/// A deletion also drops the backoff state of the instance. Runs for the
/// process lifetime; errors are retried with the default backoff.
pub fn start_index_watch(
    kibanas: Api<Kibana>,
    index: Arc<DependencyIndex>,
    backoff_states: BackoffStates,
) {
    tokio::spawn(async move {
        let stream = watcher(kibanas, watcher::Config::default()).default_backoff();
        pin_mut!(stream);
        info!("Kibana index watcher started");

        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Apply(kibana) | watcher::Event::InitApply(kibana)) => {
                    index.upsert(&kibana);
                }
                Ok(watcher::Event::Delete(kibana)) => {
                    let instance = kibana.identity();
                    debug!(instance = instance.as_str(), "dropping index and backoff entries");
                    index.remove(&instance);
                    forget_backoff(&backoff_states, &instance);
                }
                Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
                Err(e) => error!(error = %e, "Kibana index watch error"),
            }
        }

        warn!("Kibana index watch stream ended");
    });
}
