//! Mocked collaborators for reconciler unit tests

use crate::controller::events::MockEventPublisher;
use crate::controller::publisher::StatePublisher;
use crate::controller::reconciler::actions::{MockActionRunner, MockDesiredStateReconciler};
use crate::controller::reconciler::cluster_state::MockClusterStateReader;
use crate::controller::reconciler::discovery::MockConfigMapDiscovery;
use crate::controller::reconciler::kube_api::MockGrafanaApi;
use crate::controller::reconciler::types::{ClusterApiError, Reconciler};
use crate::controller::store::OperatorConfigStore;
use crate::crd::{Grafana, GrafanaSpec};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const TEST_REQUEUE_DELAY: Duration = Duration::from_secs(10);

/// Mocks without expectations panic when called
#[derive(Default)]
pub(crate) struct Collaborators {
    pub api: MockGrafanaApi,
    pub state_reader: MockClusterStateReader,
    pub desired_state: MockDesiredStateReconciler,
    pub action_runner: MockActionRunner,
    pub config_maps: MockConfigMapDiscovery,
    pub events: MockEventPublisher,
}

impl Collaborators {
    pub fn into_reconciler(self) -> Reconciler {
        Reconciler {
            api: Arc::new(self.api),
            state_reader: Arc::new(self.state_reader),
            desired_state: Arc::new(self.desired_state),
            action_runner: Arc::new(self.action_runner),
            config_maps: Arc::new(self.config_maps),
            events: Arc::new(self.events),
            store: Arc::new(OperatorConfigStore::new()),
            publisher: StatePublisher::new(),
            requeue_delay: TEST_REQUEUE_DELAY,
            backoff_min_secs: 5,
            backoff_max_secs: 300,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            cycle_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

pub(crate) fn grafana(namespace: &str, name: &str) -> Grafana {
    let mut grafana = Grafana::new(name, GrafanaSpec::default());
    grafana.metadata.namespace = Some(namespace.to_string());
    grafana.metadata.resource_version = Some("1".to_string());
    grafana.metadata.uid = Some(format!("{name}-uid"));
    grafana
}

/// Conditional status write against a stored object
///
/// Answers `Conflict` for a stale resource version, otherwise stores the
/// status and bumps the version the way the API server does.
pub(crate) fn write_status(stored: &mut Grafana, update: &Grafana) -> Result<Grafana, ClusterApiError> {
    if stored.metadata.resource_version != update.metadata.resource_version {
        return Err(ClusterApiError::Conflict(
            "the object has been modified".to_string(),
        ));
    }
    stored.status = update.status.clone();
    let next = stored
        .metadata
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    stored.metadata.resource_version = Some(next.to_string());
    Ok(stored.clone())
}
