//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::controller::publisher::StatePublisher;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::OperatorConfigStore;
use crate::observability;
use crate::runtime::watch_loop::WatchedApis;
use anyhow::{bail, Context, Result};
use kube::{api::Api, Client};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// How long to wait for the HTTP server to bind before giving up
const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SERVER_STARTUP_POLL: Duration = Duration::from_millis(100);

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    pub client: Client,
    pub apis: WatchedApis,
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Shared with the dashboard controller
    pub store: Arc<OperatorConfigStore>,
    pub publisher: StatePublisher,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Set up the `tracing` subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grafana_operator=info".into()),
        )
        .init();
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    info!("Starting Grafana controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        requeue_delay_secs = config.requeue_delay_secs,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        "Controller configuration loaded"
    );

    observability::metrics::register_metrics()?;

    let store = Arc::new(OperatorConfigStore::new());
    let publisher = StatePublisher::new();
    let server_state = Arc::new(ServerState::new(publisher.clone()));

    // Start HTTP server for metrics and probes
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let apis = match config.watch_namespace.as_deref() {
        Some(namespace) => WatchedApis {
            grafanas: Api::namespaced(client.clone(), namespace),
            services: Api::namespaced(client.clone(), namespace),
            ingresses: Api::namespaced(client.clone(), namespace),
        },
        None => WatchedApis {
            grafanas: Api::all(client.clone()),
            services: Api::all(client.clone()),
            ingresses: Api::all(client.clone()),
        },
    };

    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        config,
        Arc::clone(&store),
        publisher.clone(),
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        apis,
        reconciler,
        server_state,
        store,
        publisher,
    })
}

/// Poll until the server has bound its listener
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &JoinHandle<()>,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + SERVER_STARTUP_TIMEOUT;
    while !server_state.is_ready.load(Ordering::Relaxed) {
        if server_handle.is_finished() {
            bail!("HTTP server exited during startup");
        }
        if tokio::time::Instant::now() >= deadline {
            bail!(
                "HTTP server did not become ready within {}s",
                SERVER_STARTUP_TIMEOUT.as_secs()
            );
        }
        tokio::time::sleep(SERVER_STARTUP_POLL).await;
    }
    info!("HTTP server ready");
    Ok(())
}
