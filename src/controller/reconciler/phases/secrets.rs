//! Material mirrored from a managed backing cluster.
//!
//! Kibana pods cannot mount secrets from another namespace, so the backing
//! cluster CA and the `kibana_system` password are copied next to the
//! instance. Both phases wait while the backing cluster or its secrets are not
//! observable yet.

use super::{require, require_key};
use crate::constants::KIBANA_SYSTEM_USER;
use crate::controller::builders::{
    build_ca_elasticsearch_secrets, build_credential_secrets, ca_elasticsearch_secret_name,
    credential_secret_name, elasticsearch_credential_secret_name, elasticsearch_tls_secret_name,
    managed_elasticsearch, Snapshot, ELASTICSEARCH_CA_KEY,
};
use crate::controller::checksum::{
    checksum_annotation, data_checksum, CA_ELASTICSEARCH_SOURCE, CREDENTIAL_SOURCE,
};
use crate::controller::reconciler::phase::{KindReconciler, ReconcileContext};
use crate::controller::reconciler::types::PhaseError;
use crate::crd::{Elasticsearch, Kibana};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use tracing::debug;

fn record_checksum(ctx: &mut ReconcileContext, source: &str, current: &[Secret]) {
    if let Some(data) = current.first().and_then(|s| s.data.as_ref()) {
        ctx.snapshot
            .checksums
            .insert(checksum_annotation(source), data_checksum(data));
    }
}

/// `<i>-ca-es-kb`
#[derive(Debug, Clone, Copy, Default)]
pub struct CaElasticsearchReconciler;

#[async_trait]
impl KindReconciler for CaElasticsearchReconciler {
    type Kind = Secret;

    fn name(&self) -> &'static str {
        "CaElasticsearch"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![ca_elasticsearch_secret_name(kibana)]
    }

    async fn prepare(&self, ctx: &mut ReconcileContext, _observed: &[Secret]) -> Result<(), PhaseError> {
        let Some((name, namespace)) = managed_elasticsearch(&ctx.kibana) else {
            return Ok(());
        };
        let elasticsearch: Elasticsearch = require(&ctx.client, &namespace, &name).await?;
        let tls = elasticsearch.tls_enabled();
        ctx.snapshot.elasticsearch = Some(elasticsearch);
        if !tls {
            debug!(elasticsearch = name.as_str(), "backing cluster serves plain HTTP");
            return Ok(());
        }

        let secret: Secret =
            require(&ctx.client, &namespace, &elasticsearch_tls_secret_name(&name)).await?;
        ctx.snapshot.elasticsearch_ca = Some(require_key(&secret, ELASTICSEARCH_CA_KEY)?);
        Ok(())
    }

    fn build(&self, kibana: &Kibana, snapshot: &Snapshot) -> Result<Vec<Secret>, PhaseError> {
        Ok(build_ca_elasticsearch_secrets(kibana, snapshot))
    }

    async fn on_result(&self, ctx: &mut ReconcileContext, current: &[Secret]) -> Result<(), PhaseError> {
        record_checksum(ctx, CA_ELASTICSEARCH_SOURCE, current);
        Ok(())
    }
}

/// `<i>-credential-kb`
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialReconciler;

#[async_trait]
impl KindReconciler for CredentialReconciler {
    type Kind = Secret;

    fn name(&self) -> &'static str {
        "Credential"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![credential_secret_name(kibana)]
    }

    async fn prepare(&self, ctx: &mut ReconcileContext, _observed: &[Secret]) -> Result<(), PhaseError> {
        let Some((name, namespace)) = managed_elasticsearch(&ctx.kibana) else {
            return Ok(());
        };
        let secret: Secret = require(
            &ctx.client,
            &namespace,
            &elasticsearch_credential_secret_name(&name),
        )
        .await?;
        ctx.snapshot.elasticsearch_password = Some(require_key(&secret, KIBANA_SYSTEM_USER)?);
        Ok(())
    }

    fn build(&self, kibana: &Kibana, snapshot: &Snapshot) -> Result<Vec<Secret>, PhaseError> {
        Ok(build_credential_secrets(kibana, snapshot))
    }

    async fn on_result(&self, ctx: &mut ReconcileContext, current: &[Secret]) -> Result<(), PhaseError> {
        record_checksum(ctx, CREDENTIAL_SOURCE, current);
        Ok(())
    }
}
