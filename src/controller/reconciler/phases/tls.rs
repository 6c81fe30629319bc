//! Serving certificate of the Kibana HTTP endpoint.
//!
//! With a self-signed certificate the phase loads the stored CA and leaf,
//! lets the [`CertificateAuthorityManager`] decide whether they are still
//! usable and persists whatever it returns. With a user supplied
//! `certificateSecretRef` nothing is written: the secret is only required to
//! exist and its content is tracked for rollouts.

use super::require;
use crate::controller::builders::{build_pki_secrets, pki_secret_name, tls_secret_name, Snapshot};
use crate::controller::checksum::{checksum_annotation, data_checksum, secret_checksum, TLS_SOURCE};
use crate::controller::pki::{CaTransition, CertificateAuthorityManager, PkiSettings, CA_CERT_KEY};
use crate::controller::reconciler::phase::{KindReconciler, ReconcileContext};
use crate::controller::reconciler::types::PhaseError;
use crate::crd::Kibana;
use crate::observability::metrics;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct TlsReconciler;

fn find<'a>(secrets: &'a [Secret], name: &str) -> Option<&'a Secret> {
    secrets.iter().find(|s| s.name_any() == name)
}

#[async_trait]
impl KindReconciler for TlsReconciler {
    type Kind = Secret;

    fn name(&self) -> &'static str {
        "Tls"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![pki_secret_name(kibana), tls_secret_name(kibana)]
    }

    async fn prepare(
        &self,
        ctx: &mut ReconcileContext,
        observed: &[Secret],
    ) -> Result<(), PhaseError> {
        let kibana = ctx.kibana.clone();
        if kibana.self_signed_tls() {
            let manager = CertificateAuthorityManager::new(PkiSettings::for_kibana(&kibana));
            let (material, transition) = manager.ensure(
                find(observed, &pki_secret_name(&kibana)),
                find(observed, &tls_secret_name(&kibana)),
                ctx.now,
            )?;
            if transition != CaTransition::Valid {
                info!(
                    resource.name = kibana.instance_name(),
                    transition = transition.as_str(),
                    "certificate authority replaced"
                );
                metrics::increment_certificate_renewals();
            }
            ctx.snapshot.pki = Some(material);
            return Ok(());
        }

        if let Some(reference) = kibana
            .spec
            .tls
            .certificate_secret_ref
            .as_ref()
            .filter(|_| kibana.tls_enabled())
        {
            let secret: Secret =
                require(&ctx.client, kibana.instance_namespace(), &reference.name).await?;
            ctx.snapshot.external_ca = secret
                .data
                .as_ref()
                .and_then(|data| data.get(CA_CERT_KEY))
                .and_then(|ca| String::from_utf8(ca.0.clone()).ok());
            ctx.snapshot
                .checksums
                .insert(checksum_annotation(TLS_SOURCE), secret_checksum(&secret));
        }
        Ok(())
    }

    fn build(&self, kibana: &Kibana, snapshot: &Snapshot) -> Result<Vec<Secret>, PhaseError> {
        Ok(build_pki_secrets(kibana, snapshot.pki.as_ref()))
    }

    async fn on_result(
        &self,
        ctx: &mut ReconcileContext,
        current: &[Secret],
    ) -> Result<(), PhaseError> {
        let leaf = find(current, &tls_secret_name(&ctx.kibana)).and_then(|s| s.data.as_ref());
        if let Some(data) = leaf {
            ctx.snapshot
                .checksums
                .insert(checksum_annotation(TLS_SOURCE), data_checksum(data));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::fixtures;
    use crate::controller::pki::PkiMaterial;
    use crate::crd::SecretRef;
    use zeroize::Zeroizing;

    #[test]
    fn test_names_cover_both_secrets() {
        let kibana = fixtures::kibana();
        assert_eq!(
            TlsReconciler.names(&kibana),
            vec!["logs-pki-kb".to_string(), "logs-tls-kb".to_string()]
        );
    }

    #[test]
    fn test_nothing_built_without_material() {
        let kibana = fixtures::kibana();
        let snapshot = Snapshot::new("kibana-operator-system");
        assert!(TlsReconciler.build(&kibana, &snapshot).unwrap().is_empty());
    }

    #[test]
    fn test_user_certificate_builds_nothing() {
        let mut kibana = fixtures::kibana();
        kibana.spec.tls.certificate_secret_ref = Some(SecretRef {
            name: "kibana-cert".to_string(),
        });
        let mut snapshot = Snapshot::new("kibana-operator-system");
        snapshot.pki = Some(PkiMaterial {
            ca_cert: "ca".to_string(),
            ca_key: Zeroizing::new("ca-key".to_string()),
            ca_crl: "crl".to_string(),
            tls_cert: "leaf".to_string(),
            tls_key: Zeroizing::new("leaf-key".to_string()),
        });
        assert!(TlsReconciler.build(&kibana, &snapshot).unwrap().is_empty());
    }
}
