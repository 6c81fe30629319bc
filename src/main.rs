//! # Kibana Operator
//!
//! Kubernetes operator driving Kibana deployments from `Kibana` resources.
//!
//! Every setting is read from the environment; the flags below override the
//! most common ones.

use clap::Parser;
use kibana_operator::runtime::initialization::{initialize, StartupOverrides};
use kibana_operator::runtime::watch_loop::run_watch_loop;

#[derive(Debug, Parser)]
#[command(name = "kibana-operator", version, about)]
struct Args {
    /// Port serving metrics and probes
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Namespace the operator runs in
    #[arg(long, env = "POD_NAMESPACE")]
    namespace: Option<String>,

    /// Log format: json or text
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let init = initialize(StartupOverrides {
        metrics_port: args.metrics_port,
        operator_namespace: args.namespace,
        log_format: args.log_format,
    })
    .await?;

    run_watch_loop(init.reconciler, init.server_state).await
}
