//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::constants::CONTROLLER_NAME;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::controller::publisher::StatePublisher;
use crate::controller::reconciler::actions::{
    ActionRunner, DesiredStateReconciler, GrafanaDesiredState, KubeActionRunner,
};
use crate::controller::reconciler::cluster_state::{ClusterStateReader, KubeClusterStateReader};
use crate::controller::reconciler::discovery::{ConfigMapDiscovery, KubeConfigMapDiscovery};
use crate::controller::reconciler::kube_api::{GrafanaApi, KubeGrafanaApi};
use crate::controller::store::OperatorConfigStore;
use kube::{Client, ResourceExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

/// Identity of a managed Grafana object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub namespace: String,
    pub name: String,
}

impl ObjectId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a resource as delivered by the watch
    #[must_use]
    pub fn from_resource<K: kube::Resource>(resource: &K) -> Self {
        Self {
            namespace: resource.namespace().unwrap_or_else(|| "default".to_string()),
            name: resource.name_any(),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Classified cluster API failure
#[derive(Debug, Error)]
pub enum ClusterApiError {
    #[error("resource not found")]
    NotFound,
    /// Optimistic-concurrency conflict: the write was based on a stale read
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Kube(kube::Error),
}

impl From<kube::Error> for ClusterApiError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => ClusterApiError::NotFound,
            kube::Error::Api(api_err) if api_err.code == 409 => {
                ClusterApiError::Conflict(api_err.message)
            }
            other => ClusterApiError::Kube(other),
        }
    }
}

/// Failure of the status tracker
#[derive(Debug, Error)]
pub enum StatusError {
    /// The persisted object could not be re-read before writing
    #[error("failed to re-fetch resource: {0}")]
    Refetch(#[source] ClusterApiError),
    /// The status write failed for a reason other than a conflict
    #[error("failed to update status: {0}")]
    Update(#[source] ClusterApiError),
}

/// Errors that escape a cycle and reach the scheduler
///
/// Every other failure is handled inside the cycle: recorded on the status
/// and requeued after the fixed delay.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to fetch Grafana {id}: {source}")]
    Fetch {
        id: String,
        #[source]
        source: ClusterApiError,
    },
    #[error("Grafana {id} could not be re-read while recording a failure: {source}")]
    FatalFetch {
        id: String,
        #[source]
        source: ClusterApiError,
    },
    #[error("failed to record failure status on Grafana {id}: {source}")]
    StatusUpdate {
        id: String,
        #[source]
        source: ClusterApiError,
    },
}

/// How a cycle ended when it did not return an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The object no longer exists; shared state was cleared
    TornDown,
    /// A failure was recorded on the status
    Handled { message: String },
    /// Desired state met and the admin URL published
    Converged { admin_url: String },
}

/// Result of a cycle that did not error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requeue {
    pub after: Duration,
    pub outcome: CycleOutcome,
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciliation context shared by every cycle
///
/// All collaborators are injected; the Kubernetes-backed set is wired by
/// [`Reconciler::new`].
#[derive(Clone)]
pub struct Reconciler {
    pub api: Arc<dyn GrafanaApi>,
    pub state_reader: Arc<dyn ClusterStateReader>,
    pub desired_state: Arc<dyn DesiredStateReconciler>,
    pub action_runner: Arc<dyn ActionRunner>,
    pub config_maps: Arc<dyn ConfigMapDiscovery>,
    pub events: Arc<dyn EventPublisher>,
    pub store: Arc<OperatorConfigStore>,
    pub publisher: StatePublisher,
    /// Fixed delay used for every requeue that is not an error
    pub requeue_delay: Duration,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    // Cycle locks per resource; the controller and the deletion watch both
    // run cycles and must never overlap for the same object
    pub cycle_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("requeue_delay", &self.requeue_delay)
            .field("subscribers", &self.publisher.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Wire the Kubernetes-backed collaborators
    pub fn new(
        client: Client,
        config: &ControllerConfig,
        store: Arc<OperatorConfigStore>,
        publisher: StatePublisher,
    ) -> Self {
        Self {
            api: Arc::new(KubeGrafanaApi::new(client.clone())),
            state_reader: Arc::new(KubeClusterStateReader::new(client.clone())),
            desired_state: Arc::new(GrafanaDesiredState),
            action_runner: Arc::new(KubeActionRunner::new(client.clone())),
            config_maps: Arc::new(KubeConfigMapDiscovery::new(
                client.clone(),
                Arc::clone(&store),
            )),
            events: Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            store,
            publisher,
            requeue_delay: config.requeue_delay(),
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            cycle_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get or create the cycle lock for a resource
    ///
    /// Hold the returned lock for the whole cycle.
    pub fn cycle_lock(&self, id: &ObjectId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.cycle_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Forget the error backoff of a resource after a clean cycle
    pub fn reset_backoff(&self, id: &ObjectId) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(&id.to_string()) {
                state.reset();
            }
        }
    }
}
