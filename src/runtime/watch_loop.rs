//! # Watch Loop
//!
//! Runs the Kibana controller and restarts it when its stream ends.
//!
//! Besides the Kibana resources themselves the controller is triggered by:
//! - owned Deployments, so rollout progress updates the readiness
//! - Secrets, ConfigMaps and backing clusters, through the watch router
//!
//! Error items of the stream are only logged. Failed reconciles are requeued by
//! the error policy and the watchers retry with their own backoff.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{Elasticsearch, Kibana};
use crate::runtime::error_policy::{handle_controller_error, handle_reconciliation_error};
use crate::runtime::watch_router::{route_config_map, route_elasticsearch, route_secret};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube_runtime::controller::Config as ControllerRuntimeConfig;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

fn controller(reconciler: &Arc<Reconciler>) -> Controller<Kibana> {
    let client = reconciler.client.clone();
    let kibanas: Api<Kibana> = Api::all(client.clone());

    let secret_index = Arc::clone(&reconciler.index);
    let config_map_index = Arc::clone(&reconciler.index);
    let elasticsearch_index = Arc::clone(&reconciler.index);

    Controller::new(kibanas, watcher::Config::default().any_semantic())
        .with_config(
            ControllerRuntimeConfig::default()
                .concurrency(reconciler.config.max_concurrent_reconciliations),
        )
        .owns(Api::<Deployment>::all(client.clone()), watcher::Config::default())
        .watches(
            Api::<Secret>::all(client.clone()),
            watcher::Config::default(),
            move |secret| route_secret(&secret_index, &secret),
        )
        .watches(
            Api::<ConfigMap>::all(client.clone()),
            watcher::Config::default(),
            move |config_map| route_config_map(&config_map_index, &config_map),
        )
        .watches(
            Api::<Elasticsearch>::all(client),
            watcher::Config::default(),
            move |elasticsearch| route_elasticsearch(&elasticsearch_index, &elasticsearch),
        )
}

/// Run the controller until a shutdown signal
///
/// # Errors
///
/// Never returns an error today; the signature leaves room for startup checks.
pub async fn run_watch_loop(
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("Received shutdown signal, marking server as not ready");
        shutdown_state.set_ready(false);
    });

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");

        info!("Starting controller watch loop...");
        controller(&reconciler)
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .for_each(|result| {
                match result {
                    Ok((object, _action)) => debug!(instance = %object, "watch.event.reconciled"),
                    Err(e) => {
                        handle_controller_error(&e);
                    }
                }
                futures::future::ready(())
            })
            .instrument(watch_span)
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = reconciler.config.watch_restart_delay_after_end();
        warn!(
            delay_secs = delay.as_secs(),
            "Controller watch stream ended, restarting"
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
