//! Kibana configuration files.

use super::{config_map_name, object_meta, BuildError};
use crate::crd::Kibana;
use k8s_openapi::api::core::v1::ConfigMap;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Main configuration file, merged over the operator defaults
pub const KIBANA_CONFIG_FILE: &str = "kibana.yml";

/// `<instance>-config-kb`
///
/// `kibana.yml` is always present. User content for it is deep-merged over the
/// defaults; other user files are copied verbatim.
pub fn build_config_maps(kibana: &Kibana) -> Result<Vec<ConfigMap>, BuildError> {
    let mut data: BTreeMap<String, String> = kibana
        .spec
        .config
        .iter()
        .filter(|(file, _)| file.as_str() != KIBANA_CONFIG_FILE)
        .map(|(file, content)| (file.clone(), content.clone()))
        .collect();

    let mut config = default_config(kibana);
    if let Some(user) = kibana.spec.config.get(KIBANA_CONFIG_FILE) {
        let user: Value =
            serde_yaml::from_str(user).map_err(|e| BuildError::InvalidConfig {
                file: KIBANA_CONFIG_FILE.to_string(),
                reason: e.to_string(),
            })?;
        match user {
            Value::Mapping(user) => merge(&mut config, user),
            Value::Null => {}
            _ => {
                return Err(BuildError::InvalidConfig {
                    file: KIBANA_CONFIG_FILE.to_string(),
                    reason: "top level must be a mapping".to_string(),
                })
            }
        }
    }

    let rendered =
        serde_yaml::to_string(&Value::Mapping(config)).map_err(|e| BuildError::InvalidConfig {
            file: KIBANA_CONFIG_FILE.to_string(),
            reason: e.to_string(),
        })?;
    data.insert(KIBANA_CONFIG_FILE.to_string(), rendered);

    Ok(vec![ConfigMap {
        metadata: object_meta(
            kibana,
            config_map_name(kibana),
            &BTreeMap::new(),
            &BTreeMap::new(),
        ),
        data: Some(data),
        ..ConfigMap::default()
    }])
}

fn default_config(kibana: &Kibana) -> Mapping {
    let mut config = Mapping::new();
    config.insert("server.host".into(), "0.0.0.0".into());
    config.insert("server.name".into(), kibana.instance_name().into());
    config.insert("server.publicBaseUrl".into(), super::kibana_url(kibana).into());
    // readiness probe hits /api/status without credentials
    config.insert("status.allowAnonymous".into(), true.into());
    config
}

/// Deep merge; scalars and sequences from `overlay` replace those in `base`
fn merge(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(value)) => merge(existing, value),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
