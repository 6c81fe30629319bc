//! # CRD Generator
//!
//! Prints the `Kibana` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > deploy/crd/kibana.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! The collaborator kinds (Elasticsearch, Metricbeat, PodMonitor, Route) are
//! owned by other operators and are not generated here.

use kibana_operator::crd::Kibana;
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(&Kibana::crd())?;
    print!("{yaml}");
    Ok(())
}
