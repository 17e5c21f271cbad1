//! # Reconciliation Logic
//!
//! Main reconciliation cycle for Grafana resources.
//!
//! 1. Fetch the object; a missing object tears down shared state
//! 2. Read cluster state, diff against the spec, run the actions
//! 3. Discover jsonnet library config maps
//! 4. Record the outcome on the status, resolve the admin URL and publish
//!    the controller state to dependent controllers
//!
//! Failures in steps 2-4 are handled here: recorded as a Warning event and on
//! the status, then requeued after the fixed delay. Only the errors in
//! [`ReconcilerError`] reach the scheduler.

use crate::constants::{CONFIG_DASHBOARD_LABEL_SELECTOR, SUCCESS_MESSAGE};
use crate::controller::events::{ACTION_RECONCILE, REASON_PROCESSING_ERROR};
use crate::controller::publisher::ControllerState;
use crate::controller::reconciler::cluster_state::ClusterStateSnapshot;
use crate::controller::reconciler::endpoint::resolve_admin_url;
use crate::controller::reconciler::status::apply_status;
use crate::controller::reconciler::types::{
    ClusterApiError, CycleOutcome, ObjectId, Reconciler, ReconcilerError, Requeue, StatusError,
};
use crate::controller::store::ConfigValue;
use crate::crd::{render_selectors, Grafana, GrafanaPhase};
use crate::observability;
use anyhow::Context;
use kube::runtime::events::EventType;
use kube::Resource;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Run one reconciliation cycle for the Grafana identified by `id`
///
/// Cycles for the same object never overlap: a second caller waits until the
/// first cycle has published its outcome.
pub async fn reconcile(id: &ObjectId, reconciler: &Reconciler) -> Result<Requeue, ReconcilerError> {
    let span = tracing::info_span!(
        "reconcile",
        resource.name = id.name.as_str(),
        resource.namespace = id.namespace.as_str(),
        resource.kind = "Grafana"
    );

    async move {
        let lock = reconciler.cycle_lock(id);
        let _cycle_guard = lock.lock().await;

        let start = Instant::now();
        observability::metrics::increment_reconciliations();

        let result = reconcile_inner(id, reconciler).await;

        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_inner(
    id: &ObjectId,
    reconciler: &Reconciler,
) -> Result<Requeue, ReconcilerError> {
    let fetched = match reconciler.api.get(id).await {
        Ok(grafana) => grafana,
        Err(ClusterApiError::NotFound) => return Ok(teardown(reconciler)),
        Err(source) => {
            return Err(ReconcilerError::Fetch {
                id: id.to_string(),
                source,
            })
        }
    };

    // Work on a copy; the fetched object stays as observed
    let mut working = fetched.clone();

    match converge(reconciler, &mut working).await {
        Ok(admin_url) => {
            debug!(admin_url = admin_url.as_str(), "desired cluster state met");
            Ok(Requeue {
                after: reconciler.requeue_delay,
                outcome: CycleOutcome::Converged { admin_url },
            })
        }
        Err(issue) => manage_error(id, reconciler, &mut working, &issue).await,
    }
}

/// The Grafana object is gone: stop dependent controllers from using it
fn teardown(reconciler: &Reconciler) -> Requeue {
    info!("Grafana not found, clearing controller state");
    observability::metrics::increment_teardowns();

    reconciler.store.remove_item(CONFIG_DASHBOARD_LABEL_SELECTOR);
    reconciler.store.cleanup();
    reconciler.publisher.publish(ControllerState::not_ready());

    Requeue {
        after: reconciler.requeue_delay,
        outcome: CycleOutcome::TornDown,
    }
}

async fn converge(reconciler: &Reconciler, working: &mut Grafana) -> anyhow::Result<String> {
    let snapshot = reconciler
        .state_reader
        .read_state(working)
        .await
        .context("error reading state")?;

    let actions = reconciler.desired_state.diff(&snapshot, working);
    debug!(actions = actions.len(), "Computed cluster actions");
    reconciler.action_runner.run(working, &actions).await?;

    reconciler.config_maps.discover(working).await?;

    manage_success(reconciler, working, &snapshot).await
}

async fn manage_success(
    reconciler: &Reconciler,
    working: &mut Grafana,
    snapshot: &ClusterStateSnapshot,
) -> anyhow::Result<String> {
    let outcome = apply_status(reconciler, working, GrafanaPhase::Reconciling, SUCCESS_MESSAGE).await?;
    debug!(outcome = ?outcome, "Recorded success status");

    let admin_url = resolve_admin_url(snapshot, &working.spec)?;

    let spec = &working.spec;
    reconciler.store.set_item(
        CONFIG_DASHBOARD_LABEL_SELECTOR,
        ConfigValue::Text(render_selectors(&spec.dashboard_label_selector)),
    );

    reconciler.publisher.publish(ControllerState {
        dashboard_selectors: spec.dashboard_label_selector.clone(),
        dashboard_namespace_selector: spec.dashboard_namespace_selector.clone(),
        admin_url: admin_url.clone(),
        grafana_ready: true,
        client_timeout: spec.effective_client_timeout(),
    });

    Ok(admin_url)
}

async fn manage_error(
    id: &ObjectId,
    reconciler: &Reconciler,
    working: &mut Grafana,
    issue: &anyhow::Error,
) -> Result<Requeue, ReconcilerError> {
    let message = format!("{issue:#}");
    warn!(error = message.as_str(), "Reconciliation failed");
    observability::metrics::increment_reconciliation_failures();

    reconciler
        .events
        .publish(
            &working.object_ref(&()),
            EventType::Warning,
            REASON_PROCESSING_ERROR,
            ACTION_RECONCILE,
            Some(message.clone()),
        )
        .await;

    match apply_status(reconciler, working, GrafanaPhase::Failing, &message).await {
        Ok(outcome) => debug!(outcome = ?outcome, "Recorded failure status"),
        Err(StatusError::Refetch(source)) => {
            return Err(ReconcilerError::FatalFetch {
                id: id.to_string(),
                source,
            })
        }
        Err(StatusError::Update(source)) => {
            return Err(ReconcilerError::StatusUpdate {
                id: id.to_string(),
                source,
            })
        }
    }

    reconciler.store.invalidate_dashboards();
    reconciler.publisher.publish(ControllerState::not_ready());

    Ok(Requeue {
        after: reconciler.requeue_delay,
        outcome: CycleOutcome::Handled { message },
    })
}
