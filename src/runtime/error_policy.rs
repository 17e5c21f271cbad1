//! # Error Policy
//!
//! Backoff for reconciliation errors and watch stream errors.
//!
//! Only errors that escape a cycle arrive here; failures the cycle records on
//! the status are requeued after the fixed delay by the cycle itself.

use crate::controller::reconciler::{BackoffState, ObjectId, Reconciler, ReconcilerError};
use crate::crd::Grafana;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Used when the backoff table cannot be locked
const FALLBACK_BACKOFF_SECS: u64 = 60;

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing Grafana does not slow
/// down the others. It is reset by the next clean cycle of that resource.
pub fn handle_reconciliation_error(
    obj: Arc<Grafana>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let id = ObjectId::from_resource(obj.as_ref());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = id.name.as_str(),
        resource.namespace = id.namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", id, error);
    observability::metrics::increment_reconciliation_errors();

    let (backoff_seconds, error_count) = next_backoff(&ctx, &id);

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {})",
        backoff_seconds, error_count
    );
    Action::requeue(Duration::from_secs(backoff_seconds))
}

fn next_backoff(ctx: &Reconciler, id: &ObjectId) -> (u64, u32) {
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(id.to_string())
                .or_insert_with(|| BackoffState::new(ctx.backoff_min_secs, ctx.backoff_max_secs));
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (FALLBACK_BACKOFF_SECS, 0)
        }
    }
}

/// Log a watch stream error and decide whether the stream should continue
///
/// Returns `false` when the error means the watch must be restarted; the
/// watch loop then drops the controller stream and starts a new one.
pub fn handle_watch_stream_error(error_string: &str) -> bool {
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_401 = error_string.contains("401") || error_string.contains("Unauthorized");

    if is_401 {
        error!("Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
        false
    } else if is_410 {
        info!("Watch resource version expired (410), restarting watch");
        false
    } else {
        warn!("Controller stream error: {}", error_string);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::test_support::{grafana, Collaborators};
    use crate::controller::reconciler::ClusterApiError;

    fn fatal_error() -> ReconcilerError {
        ReconcilerError::FatalFetch {
            id: "monitoring/grafana".to_string(),
            source: ClusterApiError::NotFound,
        }
    }

    #[test]
    fn test_backoff_grows_per_resource() {
        let ctx = Arc::new(Collaborators::default().into_reconciler());
        let obj = Arc::new(grafana("monitoring", "grafana"));
        let other = Arc::new(grafana("monitoring", "other"));

        let first = handle_reconciliation_error(Arc::clone(&obj), &fatal_error(), Arc::clone(&ctx));
        let second = handle_reconciliation_error(Arc::clone(&obj), &fatal_error(), Arc::clone(&ctx));
        let third = handle_reconciliation_error(Arc::clone(&obj), &fatal_error(), Arc::clone(&ctx));
        let unrelated = handle_reconciliation_error(other, &fatal_error(), Arc::clone(&ctx));

        assert_eq!(first, Action::requeue(Duration::from_secs(5)));
        assert_eq!(second, Action::requeue(Duration::from_secs(5)));
        assert_eq!(third, Action::requeue(Duration::from_secs(10)));
        assert_eq!(unrelated, Action::requeue(Duration::from_secs(5)));
    }

    #[test]
    fn test_backoff_reset_after_clean_cycle() {
        let ctx = Arc::new(Collaborators::default().into_reconciler());
        let obj = Arc::new(grafana("monitoring", "grafana"));

        for _ in 0..4 {
            handle_reconciliation_error(Arc::clone(&obj), &fatal_error(), Arc::clone(&ctx));
        }
        ctx.reset_backoff(&ObjectId::from_resource(obj.as_ref()));

        let action = handle_reconciliation_error(obj, &fatal_error(), ctx);
        assert_eq!(action, Action::requeue(Duration::from_secs(5)));
    }

    #[test]
    fn test_watch_errors_classified() {
        assert!(!handle_watch_stream_error("WatchFailed: 410 Gone"));
        assert!(!handle_watch_stream_error("401 Unauthorized"));
        assert!(handle_watch_stream_error("connection reset by peer"));
    }
}
