//! Shared fixtures for the behaviour tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kibana_operator::controller::builders::Snapshot;
use kibana_operator::crd::{
    Elasticsearch, ElasticsearchRef, ElasticsearchSpec, ElasticsearchTlsSpec, Kibana, KibanaSpec,
    ManagedElasticsearchRef, TlsSpec,
};
use kube::client::Body;
use kube::Client;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "observability";
pub const OPERATOR_NAMESPACE: &str = "kibana-operator-system";

/// Persisted instance `observability/logs` with TLS on and no backing cluster
pub fn kibana() -> Kibana {
    let mut kibana = Kibana::new(
        "logs",
        KibanaSpec {
            version: "8.15.0".to_string(),
            ..KibanaSpec::default()
        },
    );
    kibana.metadata.namespace = Some(NAMESPACE.to_string());
    kibana.metadata.uid = Some("0d5e2f4a-1111-4222-8333-444455556666".to_string());
    kibana.metadata.generation = Some(1);
    kibana
}

pub fn kibana_without_tls() -> Kibana {
    let mut kibana = kibana();
    kibana.spec.tls = TlsSpec {
        enabled: Some(false),
        ..TlsSpec::default()
    };
    kibana
}

/// Instance pointing at the managed backing cluster `es` in its own namespace
pub fn kibana_with_managed_cluster() -> Kibana {
    let mut kibana = kibana();
    kibana.spec.elasticsearch_ref = Some(ElasticsearchRef {
        managed: Some(ManagedElasticsearchRef {
            name: "es".to_string(),
            namespace: None,
        }),
        ..ElasticsearchRef::default()
    });
    kibana
}

pub fn elasticsearch(tls: bool) -> Elasticsearch {
    let mut elasticsearch = Elasticsearch::new(
        "es",
        ElasticsearchSpec {
            version: Some("8.15.0".to_string()),
            tls: ElasticsearchTlsSpec { enabled: Some(tls) },
        },
    );
    elasticsearch.metadata.namespace = Some(NAMESPACE.to_string());
    elasticsearch
}

/// Snapshot of an operator running in the instance namespace
///
/// No network policy is expected in that layout.
pub fn local_snapshot() -> Snapshot {
    Snapshot::new(NAMESPACE)
}

pub fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..ConfigMap::default()
    }
}

/// `METHOD path` of every request the mock API server received, in order
pub type Calls = Arc<Mutex<Vec<String>>>;

/// Body the API server sends for a group or kind it does not serve
pub const UNSERVED_KIND_BODY: &str = "404 page not found\n";

/// Client backed by `respond` instead of an API server
///
/// `respond` maps method and path to a status code and a body. A body
/// starting with `{` is sent as JSON, anything else as plain text.
pub fn mock_client<F>(respond: F) -> (Client, Calls)
where
    F: Fn(&http::Method, &str) -> (u16, String) + Send + Sync + 'static,
{
    let calls: Calls = Arc::default();
    let recorded = Arc::clone(&calls);
    let service = tower::service_fn(move |request: http::Request<Body>| {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        recorded.lock().unwrap().push(format!("{method} {path}"));
        let (status, body) = respond(&method, &path);
        let content_type = if body.starts_with('{') {
            "application/json"
        } else {
            "text/plain; charset=utf-8"
        };
        async move {
            http::Response::builder()
                .status(status)
                .header(http::header::CONTENT_TYPE, content_type)
                .body(Body::from(body.into_bytes()))
        }
    });
    (Client::new(service, NAMESPACE), calls)
}

/// JSON `Status` body of a failed call
pub fn status_body(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code,
    })
    .to_string()
}

pub fn recorded(calls: &Calls) -> Vec<String> {
    calls.lock().unwrap().clone()
}
