//! Kibana workload.

use super::{
    ca_elasticsearch_secret_name, config_map_name, credential_secret_name, elasticsearch_url,
    labels, managed_elasticsearch, object_meta, selector_labels, serving_secret_name,
    workload_name, Snapshot, KIBANA_CONFIG_FILE, PASSWORD_KEY, PROMETHEUS_PLUGIN_URL,
    USERNAME_KEY,
};
use crate::constants::KIBANA_PORT;
use crate::controller::pki::{TLS_CERT_KEY, TLS_KEY_KEY};
use crate::crd::Kibana;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, HTTPGetAction, PodAffinityTerm, PodAntiAffinity, PodSpec, PodTemplateSpec,
    Probe, SecretKeySelector, SecretVolumeSource, Volume, VolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::{BTreeMap, BTreeSet};

const KIBANA_HOME: &str = "/usr/share/kibana";
const CONFIG_DIR: &str = "/usr/share/kibana/config";
const CERT_DIR: &str = "/usr/share/kibana/config/api-cert";
const ES_CA_DIR: &str = "/usr/share/kibana/config/es-ca";
const PLUGINS_DIR: &str = "/usr/share/kibana/plugins";
const KEYSTORE_FILE: &str = "kibana.keystore";

/// `<instance>-kb`, always present
///
/// `snapshot.checksums` lands in the pod template annotations so a change in
/// any referenced ConfigMap or Secret rolls the pods.
#[must_use]
pub fn build_deployments(kibana: &Kibana, snapshot: &Snapshot) -> Vec<Deployment> {
    let policy = &kibana.spec.deployment;
    let mut volumes = vec![Volume {
        name: "config".to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map_name(kibana),
            ..ConfigMapVolumeSource::default()
        }),
        ..Volume::default()
    }];
    let mut mounts: Vec<VolumeMount> = config_files(kibana)
        .into_iter()
        .map(|file| VolumeMount {
            name: "config".to_string(),
            mount_path: format!("{CONFIG_DIR}/{file}"),
            sub_path: Some(file),
            ..VolumeMount::default()
        })
        .collect();

    if let Some(secret) = serving_secret_name(kibana) {
        volumes.push(secret_volume("api-cert", secret));
        mounts.push(mount("api-cert", CERT_DIR));
    }
    if let Some(secret) = elasticsearch_ca_secret(kibana, snapshot) {
        volumes.push(secret_volume("es-ca", secret));
        mounts.push(mount("es-ca", ES_CA_DIR));
    }

    let mut init_containers = Vec::new();
    if let Some(keystore) = &kibana.spec.keystore_secret_ref {
        volumes.push(secret_volume("keystore-secrets", keystore.name.clone()));
        volumes.push(empty_dir("keystore"));
        mounts.push(VolumeMount {
            name: "keystore".to_string(),
            mount_path: format!("{CONFIG_DIR}/{KEYSTORE_FILE}"),
            sub_path: Some(KEYSTORE_FILE.to_string()),
            ..VolumeMount::default()
        });
        init_containers.push(keystore_container(kibana));
    }
    let plugins = plugins(kibana);
    if !plugins.is_empty() {
        volumes.push(empty_dir("plugins"));
        mounts.push(mount("plugins", PLUGINS_DIR));
        init_containers.push(plugin_container(kibana, &plugins));
    }

    let kibana_container = Container {
        name: "kibana".to_string(),
        image: Some(kibana.image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        env: Some(merge_env(operator_env(kibana, snapshot), &policy.env)),
        env_from: (!policy.env_from.is_empty()).then(|| policy.env_from.clone()),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: KIBANA_PORT,
            protocol: Some("TCP".to_string()),
            ..ContainerPort::default()
        }]),
        readiness_probe: Some(readiness_probe(kibana)),
        resources: policy.resources.clone(),
        volume_mounts: Some(mounts),
        ..Container::default()
    };

    let mut template_labels = policy.pod_template_labels.clone();
    template_labels.extend(selector_labels(kibana));
    let mut template_annotations = policy.pod_template_annotations.clone();
    template_annotations.extend(snapshot.checksums.clone());

    let pod = PodSpec {
        containers: vec![kibana_container],
        init_containers: (!init_containers.is_empty()).then_some(init_containers),
        volumes: Some(volumes),
        affinity: Some(
            policy
                .affinity
                .clone()
                .unwrap_or_else(|| default_affinity(kibana)),
        ),
        tolerations: (!policy.tolerations.is_empty()).then(|| policy.tolerations.clone()),
        node_selector: (!policy.node_selector.is_empty()).then(|| policy.node_selector.clone()),
        service_account_name: policy
            .service_account
            .as_ref()
            .map(|_| workload_name(kibana)),
        ..PodSpec::default()
    };

    vec![Deployment {
        metadata: object_meta(
            kibana,
            workload_name(kibana),
            &BTreeMap::new(),
            &BTreeMap::new(),
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(policy.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(kibana)),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(kibana, &template_labels)),
                    annotations: (!template_annotations.is_empty())
                        .then_some(template_annotations),
                    ..ObjectMeta::default()
                }),
                spec: Some(pod),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }]
}

/// Files mounted from the config map
fn config_files(kibana: &Kibana) -> BTreeSet<String> {
    let mut files: BTreeSet<String> = kibana.spec.config.keys().cloned().collect();
    files.insert(KIBANA_CONFIG_FILE.to_string());
    files
}

/// Secret holding the backing cluster CA, mirrored or user supplied
fn elasticsearch_ca_secret(kibana: &Kibana, snapshot: &Snapshot) -> Option<String> {
    let reference = kibana.spec.elasticsearch_ref.as_ref()?;
    if reference.is_managed() {
        return snapshot
            .elasticsearch_tls()
            .then(|| ca_elasticsearch_secret_name(kibana));
    }
    reference.ca_secret_ref.as_ref().map(|r| r.name.clone())
}

fn plugins(kibana: &Kibana) -> Vec<String> {
    let mut plugins = kibana.spec.deployment.plugins.clone();
    if let Some(prometheus) = kibana.spec.monitoring.prometheus() {
        plugins.push(prometheus.plugin_url.clone().unwrap_or_else(|| {
            PROMETHEUS_PLUGIN_URL.replace("{version}", &kibana.spec.version)
        }));
    }
    plugins
}

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..EnvVar::default()
    }
}

fn secret_env(name: &str, secret: String, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret,
                key: key.to_string(),
                ..SecretKeySelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

fn operator_env(kibana: &Kibana, snapshot: &Snapshot) -> Vec<EnvVar> {
    let mut vars = Vec::new();

    if let Some((name, namespace)) = managed_elasticsearch(kibana) {
        vars.push(env(
            "ELASTICSEARCH_HOSTS",
            elasticsearch_url(&name, &namespace, snapshot.elasticsearch_tls()),
        ));
        vars.push(secret_env(
            "ELASTICSEARCH_USERNAME",
            credential_secret_name(kibana),
            USERNAME_KEY,
        ));
        vars.push(secret_env(
            "ELASTICSEARCH_PASSWORD",
            credential_secret_name(kibana),
            PASSWORD_KEY,
        ));
    } else if let Some(reference) = &kibana.spec.elasticsearch_ref {
        if let Some(external) = &reference.external {
            let hosts = match external.addresses.as_slice() {
                [single] => single.clone(),
                many => format!("[\"{}\"]", many.join("\",\"")),
            };
            vars.push(env("ELASTICSEARCH_HOSTS", hosts));
        }
        if let Some(secret) = &reference.secret_ref {
            vars.push(secret_env(
                "ELASTICSEARCH_USERNAME",
                secret.name.clone(),
                USERNAME_KEY,
            ));
            vars.push(secret_env(
                "ELASTICSEARCH_PASSWORD",
                secret.name.clone(),
                PASSWORD_KEY,
            ));
        }
    }

    if elasticsearch_ca_secret(kibana, snapshot).is_some() {
        vars.push(env(
            "ELASTICSEARCH_SSL_CERTIFICATEAUTHORITIES",
            format!("{ES_CA_DIR}/ca.crt"),
        ));
    }

    if kibana.tls_enabled() {
        vars.push(env("SERVER_SSL_ENABLED", "true"));
        vars.push(env(
            "SERVER_SSL_CERTIFICATE",
            format!("{CERT_DIR}/{TLS_CERT_KEY}"),
        ));
        vars.push(env("SERVER_SSL_KEY", format!("{CERT_DIR}/{TLS_KEY_KEY}")));
    }

    vars
}

/// User variables replace operator ones with the same name, others are appended
fn merge_env(mut base: Vec<EnvVar>, user: &[EnvVar]) -> Vec<EnvVar> {
    for var in user {
        match base.iter_mut().find(|existing| existing.name == var.name) {
            Some(existing) => *existing = var.clone(),
            None => base.push(var.clone()),
        }
    }
    base
}

fn readiness_probe(kibana: &Kibana) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/api/status".to_string()),
            port: IntOrString::Int(KIBANA_PORT),
            scheme: Some(if kibana.tls_enabled() { "HTTPS" } else { "HTTP" }.to_string()),
            ..HTTPGetAction::default()
        }),
        initial_delay_seconds: Some(10),
        period_seconds: Some(10),
        timeout_seconds: Some(5),
        failure_threshold: Some(3),
        success_threshold: Some(1),
        ..Probe::default()
    }
}

fn default_affinity(kibana: &Kibana) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: 10,
                    pod_affinity_term: PodAffinityTerm {
                        topology_key: "kubernetes.io/hostname".to_string(),
                        label_selector: Some(LabelSelector {
                            match_labels: Some(selector_labels(kibana)),
                            ..LabelSelector::default()
                        }),
                        ..PodAffinityTerm::default()
                    },
                },
            ]),
            ..PodAntiAffinity::default()
        }),
        ..Affinity::default()
    }
}

fn keystore_container(kibana: &Kibana) -> Container {
    let script = format!(
        "set -e\n\
         {KIBANA_HOME}/bin/kibana-keystore create\n\
         for file in /mnt/keystore-secrets/*; do\n  \
           key=$(basename \"$file\")\n  \
           {KIBANA_HOME}/bin/kibana-keystore add -x \"$key\" < \"$file\"\n\
         done\n\
         cp -a {CONFIG_DIR}/{KEYSTORE_FILE} /mnt/keystore/\n"
    );
    Container {
        name: "init-keystore".to_string(),
        image: Some(kibana.image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec!["/bin/bash".to_string(), "-c".to_string(), script]),
        volume_mounts: Some(vec![
            mount("keystore-secrets", "/mnt/keystore-secrets"),
            mount("keystore", "/mnt/keystore"),
        ]),
        ..Container::default()
    }
}

fn plugin_container(kibana: &Kibana, plugins: &[String]) -> Container {
    let mut script = String::from("set -e\n");
    for plugin in plugins {
        script.push_str(&format!(
            "{KIBANA_HOME}/bin/kibana-plugin install --batch \"{plugin}\"\n"
        ));
    }
    script.push_str(&format!("cp -a {PLUGINS_DIR}/. /mnt/plugins/\n"));

    Container {
        name: "init-plugins".to_string(),
        image: Some(kibana.image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec!["/bin/bash".to_string(), "-c".to_string(), script]),
        volume_mounts: Some(vec![mount("plugins", "/mnt/plugins")]),
        ..Container::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..VolumeMount::default()
    }
}

fn secret_volume(name: &str, secret: String) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret),
            ..SecretVolumeSource::default()
        }),
        ..Volume::default()
    }
}

fn empty_dir(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Volume::default()
    }
}
