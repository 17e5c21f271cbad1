//! # Watch Loop
//!
//! Controller watch loop that monitors Grafana resources, and the Services and
//! Ingresses they own, and triggers reconciliation when changes are detected.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{reconcile, ObjectId, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::crd::Grafana;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::Api;
use kube_runtime::{controller, controller::Action, watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// APIs watched by the controller
#[derive(Clone)]
pub struct WatchedApis {
    pub grafanas: Api<Grafana>,
    pub services: Api<Service>,
    pub ingresses: Api<Ingress>,
}

impl std::fmt::Debug for WatchedApis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedApis").finish_non_exhaustive()
    }
}

/// Run the controller watch loop
///
/// Restarts the controller when its stream ends, or when a watch error calls
/// for a fresh watch, unless a shutdown was requested.
pub async fn run_watch_loop(
    apis: WatchedApis,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: &ControllerConfig,
) -> Result<(), anyhow::Error> {
    // Mark server as not ready when SIGTERM/SIGINT received
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.is_ready.store(false, Ordering::Relaxed);
    });

    spawn_deletion_watch(apis.grafanas.clone(), Arc::clone(&reconciler));

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!("Starting controller watch loop...");
        let controller_stream = Controller::new(
            apis.grafanas.clone(),
            watcher::Config::default().any_semantic(),
        )
        .owns(apis.services.clone(), watcher::Config::default())
        .owns(apis.ingresses.clone(), watcher::Config::default())
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
        .shutdown_on_signal()
        .run(
            reconcile_object,
            handle_reconciliation_error,
            Arc::clone(&reconciler),
        );
        pin_mut!(controller_stream);

        while let Some(result) = controller_stream.next().await {
            match result {
                Ok((object, action)) => {
                    debug!(resource = %object, action = ?action, "watch.event.reconciled");
                }
                Err(e) => {
                    if !handle_watch_stream_error(&format!("{e:?}")) {
                        warn!("Dropping controller stream after watch error");
                        break;
                    }
                }
            }
        }

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream stopped, restarting in {} seconds...",
            config.watch_restart_delay_secs
        );
        tokio::time::sleep(config.watch_restart_delay()).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Bridge from the watch to a reconciliation cycle
///
/// The cycle re-fetches the object by identity, so only the name and namespace
/// of the delivered object are used.
async fn reconcile_object(
    obj: Arc<Grafana>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let id = ObjectId::from_resource(obj.as_ref());
    let requeue = reconcile(&id, &ctx).await?;
    ctx.reset_backoff(&id);
    debug!(resource = %id, outcome = ?requeue.outcome, "Reconciliation cycle finished");
    Ok(Action::requeue(requeue.after))
}

/// Run a cycle for every deleted Grafana so dependent controllers learn it is gone
///
/// The controller itself never schedules deleted objects.
fn spawn_deletion_watch(grafanas: Api<Grafana>, reconciler: Arc<Reconciler>) {
    tokio::spawn(async move {
        let stream = watcher(grafanas, watcher::Config::default());
        pin_mut!(stream);

        while let Some(event_result) = stream.next().await {
            match event_result {
                Ok(watcher::Event::Delete(grafana)) => {
                    let id = ObjectId::from_resource(&grafana);
                    info!(resource = %id, "Grafana deleted");
                    if let Err(e) = reconcile(&id, &reconciler).await {
                        error!(resource = %id, error = %e, "Teardown after deletion failed");
                    }
                }
                Ok(
                    watcher::Event::Apply(_)
                    | watcher::Event::Init
                    | watcher::Event::InitApply(_)
                    | watcher::Event::InitDone,
                ) => {}
                Err(e) => {
                    warn!("Error watching Grafana deletions: {}", e);
                }
            }
        }

        warn!("Grafana deletion watch stream ended");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::test_support::{grafana, Collaborators, TEST_REQUEUE_DELAY};
    use crate::controller::reconciler::ClusterApiError;

    #[tokio::test]
    async fn test_deleted_object_requeues_after_fixed_delay() {
        let mut collaborators = Collaborators::default();
        collaborators
            .api
            .expect_get()
            .returning(|_| Err(ClusterApiError::NotFound));
        let ctx = Arc::new(collaborators.into_reconciler());

        let action = reconcile_object(Arc::new(grafana("monitoring", "grafana")), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(TEST_REQUEUE_DELAY));
    }

    #[tokio::test]
    async fn test_scheduler_error_is_returned() {
        let mut collaborators = Collaborators::default();
        collaborators
            .api
            .expect_get()
            .returning(|_| Err(ClusterApiError::Conflict("unexpected".to_string())));
        let ctx = Arc::new(collaborators.into_reconciler());

        let result = reconcile_object(Arc::new(grafana("monitoring", "grafana")), ctx).await;
        assert!(matches!(result, Err(ReconcilerError::Fetch { .. })));
    }
}
