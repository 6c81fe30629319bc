//! `kibana.yml` and the extra configuration files.

use crate::controller::builders::{build_config_maps, config_map_name, Snapshot};
use crate::controller::checksum::{checksum_annotation, config_map_checksum, CONFIG_SOURCE};
use crate::controller::reconciler::phase::{KindReconciler, ReconcileContext};
use crate::controller::reconciler::types::PhaseError;
use crate::crd::Kibana;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigMapReconciler;

#[async_trait]
impl KindReconciler for ConfigMapReconciler {
    type Kind = ConfigMap;

    fn name(&self) -> &'static str {
        "ConfigMap"
    }

    fn names(&self, kibana: &Kibana) -> Vec<String> {
        vec![config_map_name(kibana)]
    }

    fn build(&self, kibana: &Kibana, _snapshot: &Snapshot) -> Result<Vec<ConfigMap>, PhaseError> {
        Ok(build_config_maps(kibana)?)
    }

    async fn on_result(
        &self,
        ctx: &mut ReconcileContext,
        current: &[ConfigMap],
    ) -> Result<(), PhaseError> {
        if let Some(config_map) = current.first() {
            ctx.snapshot.checksums.insert(
                checksum_annotation(CONFIG_SOURCE),
                config_map_checksum(config_map),
            );
        }
        Ok(())
    }
}
