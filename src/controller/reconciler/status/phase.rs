//! # Status Phase Updates
//!
//! Handles updating status phase and message.

use crate::controller::reconciler::types::{ClusterApiError, ObjectId, Reconciler, StatusError};
use crate::crd::{DashboardMap, Grafana, GrafanaPhase};
use crate::observability;
use tracing::{debug, warn};

/// Result of a status write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Updated,
    /// Persisted status already equal; nothing was written
    Unchanged,
    /// The write lost an optimistic-concurrency race; the next cycle retries
    Conflict,
}

impl StatusOutcome {
    #[must_use]
    pub fn updated(self) -> bool {
        matches!(self, StatusOutcome::Updated)
    }
}

/// Update status phase and message on the working copy and persist it
///
/// Dashboards are copied from the store only once the dashboard controller
/// has synced; until then the map already on the resource is kept.
/// The persisted object is re-read and the write skipped when the status is
/// already equal, so repeated cycles do not generate watch events.
/// After a successful write the working copy carries the new resource version.
pub async fn apply_status(
    reconciler: &Reconciler,
    working: &mut Grafana,
    phase: GrafanaPhase,
    message: &str,
) -> Result<StatusOutcome, StatusError> {
    let store = &reconciler.store;
    let status = working.status.get_or_insert_with(Default::default);
    status.phase = Some(phase);
    status.message = Some(message.to_string());

    if store.dashboards_synced() {
        status.installed_dashboards = store.dashboards();
    } else {
        store.ensure_dashboards();
        if status.installed_dashboards.is_none() {
            status.installed_dashboards = Some(DashboardMap::new());
        }
    }

    let id = ObjectId::from_resource(working);
    let persisted = reconciler
        .api
        .get(&id)
        .await
        .map_err(StatusError::Refetch)?;

    if persisted.status == working.status {
        debug!(
            resource = %id,
            phase = %phase,
            "Skipping status update - status unchanged"
        );
        return Ok(StatusOutcome::Unchanged);
    }

    match reconciler.api.update_status(working).await {
        Ok(updated) => {
            // Later writes in the same cycle are conditional on the new version
            working.metadata.resource_version = updated.metadata.resource_version;
            observability::metrics::increment_status_updates();
            debug!(resource = %id, phase = %phase, "Updated status");
            Ok(StatusOutcome::Updated)
        }
        Err(ClusterApiError::Conflict(reason)) => {
            // Resource might just be outdated
            observability::metrics::increment_status_conflicts();
            warn!(resource = %id, reason = reason.as_str(), "Status update conflict, will retry next cycle");
            Ok(StatusOutcome::Conflict)
        }
        Err(e) => Err(StatusError::Update(e)),
    }
}
