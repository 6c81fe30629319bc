//! # Initialization
//!
//! Process setup run once before the watch loop: rustls provider, tracing,
//! metrics, the HTTP server, the Kubernetes client and the dependency index.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::index::DependencyIndex;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::Kibana;
use crate::observability;
use crate::runtime::watch_router::start_index_watch;
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use tracing_subscriber::EnvFilter;

/// Command line overrides of the environment configuration
#[derive(Debug, Clone, Default)]
pub struct StartupOverrides {
    pub metrics_port: Option<u16>,
    pub operator_namespace: Option<String>,
    pub log_format: Option<String>,
}

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    /// Readiness flag shared with the probes
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kibana_operator={}",
            config.log_level.to_lowercase()
        ))
    });

    let installed = if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Initialize the operator runtime
///
/// # Errors
///
/// Tracing or metrics registration failures, an HTTP server that does not
/// bind in time, or no reachable cluster configuration.
pub async fn initialize(overrides: StartupOverrides) -> Result<InitializationResult> {
    // Must precede any TLS use; an error means a provider is already installed
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    let mut controller_config = ControllerConfig::from_env();
    let mut server_config = ServerConfig::from_env();
    if let Some(port) = overrides.metrics_port {
        server_config.metrics_port = port;
    }
    if let Some(namespace) = overrides.operator_namespace {
        controller_config.operator_namespace = namespace;
    }
    if let Some(format) = overrides.log_format {
        controller_config.log_format = format;
    }

    init_tracing(&controller_config)?;
    if !provider_installed {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting Kibana operator");
    info!(
        build.timestamp = env!("BUILD_TIMESTAMP"),
        build.datetime = env!("BUILD_DATETIME"),
        build.git_hash = env!("BUILD_GIT_HASH"),
        "build info"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = server_config.metrics_port;
    let server_task_state = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_task_state).await {
            error!(error = %e, "HTTP server error");
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    info!(
        operator_namespace = controller_config.operator_namespace.as_str(),
        max_concurrent_reconciliations = controller_config.max_concurrent_reconciliations,
        "controller configuration loaded"
    );

    let index = Arc::new(DependencyIndex::new());
    let kibanas: Api<Kibana> = Api::all(client.clone());
    prime_index(&kibanas, &index).await;

    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        controller_config,
        Arc::clone(&index),
    ));
    start_index_watch(kibanas, index, Arc::clone(&reconciler.backoff_states));

    info!("Operator initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}

/// Poll until the HTTP server has bound its port
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let start = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(server_config.poll_interval()).await;
    }
}

/// Index the instances that exist before the first watch event
///
/// Without this a Secret event arriving before the instance is first
/// reconciled would route nowhere.
async fn prime_index(kibanas: &Api<Kibana>, index: &DependencyIndex) {
    let span = tracing::info_span!("controller.startup.prime_index", operation = "prime_index");

    match kibanas.list(&ListParams::default()).instrument(span).await {
        Ok(list) => {
            for kibana in &list.items {
                index.upsert(kibana);
            }
            info!(instances = list.items.len(), "dependency index primed");
        }
        Err(e) => warn!(
            error = %e,
            "cannot list Kibana resources, is the CRD installed? The index fills from the watch"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_task_exit_fails_startup() {
        let state = ServerState::default();
        let handle = tokio::spawn(async {});
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let config = ServerConfig {
            metrics_port: 0,
            startup_timeout_secs: 1,
            poll_interval_ms: 5,
        };
        let result = wait_for_server_ready(&state, &handle, &config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ready_server_passes() {
        let state = ServerState::default();
        state.set_ready(true);
        let handle = tokio::spawn(std::future::pending::<()>());

        let config = ServerConfig::default();
        assert!(wait_for_server_ready(&state, &handle, &config).await.is_ok());
        handle.abort();
    }
}
