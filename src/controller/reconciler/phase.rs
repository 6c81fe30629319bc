//! # Phases
//!
//! A phase reconciles one managed kind. [`KindReconciler`] is generic over the
//! kind; [`PhaseAdapter`] turns it into the object safe [`Phase`] the
//! orchestrator keeps in a homogeneous list.
//!
//! Each run goes Read → Diff → Apply → OnResult:
//!
//! - Read fetches the observed objects by their deterministic names, keeps the
//!   ones owned by the instance, lets the phase record collaborator state into
//!   the snapshot and builds the expected objects. A kind the API server does
//!   not serve (its CRD is not installed) has no observed objects.
//! - Diff classifies create/update/delete (see [`super::diff`])
//! - Apply performs the calls (see [`super::apply`])
//! - OnResult lets the phase inspect what now exists

use crate::controller::builders::Snapshot;
use crate::controller::reconciler::apply::{apply, ApplyReport};
use crate::controller::reconciler::diff::diff;
use crate::controller::reconciler::types::PhaseError;
use crate::crd::Kibana;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::api::Api;
use kube::core::NamespaceResourceScope;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Namespaced kinds a phase can manage
pub trait ManagedResource:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> ManagedResource for T where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// State shared by the phases of one reconcile
pub struct ReconcileContext {
    pub client: Client,
    pub kibana: Arc<Kibana>,
    pub snapshot: Snapshot,
    pub now: DateTime<Utc>,
    /// Set by the workload phase: ready replicas match the desired count
    pub workload_ready: Option<bool>,
}

impl std::fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("kibana", &self.kibana.identity())
            .field("snapshot", &self.snapshot)
            .field("now", &self.now)
            .field("workload_ready", &self.workload_ready)
            .finish_non_exhaustive()
    }
}

impl ReconcileContext {
    #[must_use]
    pub fn new(client: Client, kibana: Arc<Kibana>, operator_namespace: &str) -> Self {
        Self {
            client,
            kibana,
            snapshot: Snapshot::new(operator_namespace),
            now: Utc::now(),
            workload_ready: None,
        }
    }

    /// Api scoped to the instance namespace
    #[must_use]
    pub fn api<K: ManagedResource>(&self) -> Api<K> {
        Api::namespaced(self.client.clone(), self.kibana.instance_namespace())
    }
}

/// Whether `object` is controlled by `kibana`
#[must_use]
pub fn is_owned_by<K: Resource>(object: &K, kibana: &Kibana) -> bool {
    let Some(uid) = kibana.metadata.uid.as_deref() else {
        return false;
    };
    object.owner_references().iter().any(|r| r.uid == uid)
}

/// 404 for the resource type itself rather than for a named object
///
/// The API server answers a lookup on an unknown group or kind with a plain
/// text `404 page not found` body, not a `NotFound` status.
#[must_use]
pub fn is_kind_not_served(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404 && response.reason != "NotFound")
}

/// Reconciler of one managed kind
#[async_trait]
pub trait KindReconciler: Send + Sync {
    type Kind: ManagedResource;

    /// Phase name used in conditions, logs and metrics
    fn name(&self) -> &'static str;

    /// Every name this phase may own for `kibana`, produced or not
    fn names(&self, kibana: &Kibana) -> Vec<String>;

    /// Record collaborator state needed by `build`
    async fn prepare(
        &self,
        _ctx: &mut ReconcileContext,
        _observed: &[Self::Kind],
    ) -> Result<(), PhaseError> {
        Ok(())
    }

    /// Expected objects, no I/O
    fn build(&self, kibana: &Kibana, snapshot: &Snapshot) -> Result<Vec<Self::Kind>, PhaseError>;

    /// Inspect the objects as they exist after apply
    async fn on_result(
        &self,
        _ctx: &mut ReconcileContext,
        _current: &[Self::Kind],
    ) -> Result<(), PhaseError> {
        Ok(())
    }
}

/// Object safe phase
#[async_trait]
pub trait Phase: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut ReconcileContext) -> Result<ApplyReport, PhaseError>;
}

/// Wraps a [`KindReconciler`] as a [`Phase`]
#[derive(Debug)]
pub struct PhaseAdapter<R>(pub R);

impl<R: KindReconciler> PhaseAdapter<R> {
    /// Observed objects owned by the instance, then expected objects
    async fn read(
        &self,
        ctx: &mut ReconcileContext,
    ) -> Result<(Vec<R::Kind>, Vec<R::Kind>), PhaseError> {
        let api: Api<R::Kind> = ctx.api();
        let mut observed = Vec::new();
        for name in self.0.names(&ctx.kibana) {
            match api.get_opt(&name).await {
                Ok(Some(object)) if is_owned_by(&object, &ctx.kibana) => observed.push(object),
                Ok(Some(_)) => {
                    debug!(object = name.as_str(), "skipping object not owned by instance");
                }
                Ok(None) => {}
                Err(e) if is_kind_not_served(&e) => {
                    let kind = R::Kind::kind(&());
                    debug!(%kind, "kind not served by the API server, nothing observed");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.0.prepare(ctx, &observed).await?;
        let expected = self.0.build(&ctx.kibana, &ctx.snapshot)?;
        Ok((observed, expected))
    }
}

#[async_trait]
impl<R: KindReconciler> Phase for PhaseAdapter<R> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    async fn run(&self, ctx: &mut ReconcileContext) -> Result<ApplyReport, PhaseError> {
        let span = tracing::info_span!(
            "controller.phase",
            phase = self.name(),
            resource.name = ctx.kibana.instance_name(),
            resource.namespace = ctx.kibana.instance_namespace(),
        );
        async {
            let (observed, expected) = self.read(ctx).await?;
            let changes = diff(&ctx.kibana, observed, expected)?;
            let api: Api<R::Kind> = ctx.api();
            let (current, report) = apply(&api, self.name(), changes).await?;
            self.0.on_result(ctx, &current).await?;
            if !report.is_empty() {
                debug!(
                    created = report.created,
                    updated = report.updated,
                    recreated = report.recreated,
                    deleted = report.deleted,
                    objects = ?current.iter().map(ResourceExt::name_any).collect::<Vec<_>>(),
                    "phase applied changes"
                );
            }
            Ok(report)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn not_found(reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "404 Not Found".to_string(),
            message: "404 page not found".to_string(),
            reason: reason.to_string(),
            code: 404,
        })
    }

    #[test]
    fn test_unknown_kind_is_told_apart_from_missing_object() {
        assert!(is_kind_not_served(&not_found("Failed to parse error data")));
        assert!(!is_kind_not_served(&not_found("NotFound")));
        assert!(!is_kind_not_served(&kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        })));
    }
}
