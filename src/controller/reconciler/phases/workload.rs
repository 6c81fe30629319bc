//! The Kibana Deployment.
//!
//! Before building, every user ConfigMap and Secret the pods read is fetched
//! and hashed into the pod template; operator managed sources were hashed by
//! the earlier phases. After apply, the observed rollout state decides the
//! readiness of the instance.

use crate::controller::builders::{build_deployments, workload_name, Snapshot};
use crate::controller::checksum::{
    config_map_checksum, references, secret_checksum, SourceKind, SourceRef,
};
use crate::controller::reconciler::phase::{KindReconciler, ReconcileContext};
use crate::controller::reconciler::types::PhaseError;
use crate::crd::Kibana;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use tracing::debug;

/// Whether the rollout of the current generation is complete
///
/// Ready means the controller observed the current generation and both the
/// updated and the ready replica counts match the desired count.
#[must_use]
pub fn deployment_ready(deployment: &Deployment) -> bool {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let Some(status) = deployment.status.as_ref() else {
        return desired == 0;
    };
    let observed = match (deployment.metadata.generation, status.observed_generation) {
        (Some(generation), Some(observed)) => observed >= generation,
        _ => true,
    };
    observed
        && status.ready_replicas.unwrap_or(0) == desired
        && status.updated_replicas.unwrap_or(0) == desired
}

async fn source_checksum(
    ctx: &ReconcileContext,
    source: &SourceRef,
) -> Result<Option<String>, PhaseError> {
    let namespace = ctx.kibana.instance_namespace();
    let checksum = match source.kind {
        SourceKind::Secret => Api::<Secret>::namespaced(ctx.client.clone(), namespace)
            .get_opt(&source.name)
            .await?
            .map(|secret| secret_checksum(&secret)),
        SourceKind::ConfigMap => Api::<ConfigMap>::namespaced(ctx.client.clone(), namespace)
            .get_opt(&source.name)
            .await?
            .map(|config_map| config_map_checksum(&config_map)),
    };
    Ok(checksum)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentReconciler;

#[async_trait]
impl KindReconciler for DeploymentReconciler {
    type Kind = Deployment;

    fn name(&self) -> &'static str {
        "Deployment"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![workload_name(kibana)]
    }

    async fn prepare(
        &self,
        ctx: &mut ReconcileContext,
        _observed: &[Deployment],
    ) -> Result<(), PhaseError> {
        for source in references(&ctx.kibana) {
            match source_checksum(ctx, &source).await? {
                Some(checksum) => {
                    ctx.snapshot
                        .checksums
                        .insert(source.kind.annotation(&source.name), checksum);
                }
                None if source.optional => {
                    debug!(
                        source.kind = source.kind.as_str(),
                        source.name = source.name.as_str(),
                        "optional source not found"
                    );
                }
                None => {
                    return Err(PhaseError::DependencyNotReady(format!(
                        "{} {}/{} not found",
                        source.kind.as_str(),
                        ctx.kibana.instance_namespace(),
                        source.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn build(&self, kibana: &Kibana, snapshot: &Snapshot) -> Result<Vec<Deployment>, PhaseError> {
        Ok(build_deployments(kibana, snapshot))
    }

    async fn on_result(
        &self,
        ctx: &mut ReconcileContext,
        current: &[Deployment],
    ) -> Result<(), PhaseError> {
        ctx.workload_ready = Some(current.first().is_some_and(deployment_ready));
        Ok(())
    }
}
