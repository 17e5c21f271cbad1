//! # Reconciler
//!
//! Core reconciliation logic for `Grafana` resources.
//!
//! The reconciler:
//! - Fetches the `Grafana` object and tears down shared state when it is gone
//! - Reads the Service, Ingress and Route that expose Grafana
//! - Applies the actions needed to reach the declared state
//! - Discovers jsonnet library config maps
//! - Updates the resource status and publishes the controller state
//!
//! Collaborators are injected through the traits in `kube_api`,
//! `cluster_state`, `actions` and `discovery`; the `reconcile`, `status` and
//! `endpoint` modules hold the decisions.

pub mod actions;
pub mod cluster_state;
pub mod discovery;
pub mod endpoint;
pub mod kube_api;
pub mod reconcile;
pub mod status;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export public API
pub use actions::{
    ActionRunner, ActionSet, ClusterAction, DesiredStateReconciler, GrafanaDesiredState,
    KubeActionRunner,
};
pub use cluster_state::{
    ClusterStateReader, ClusterStateSnapshot, GrafanaRoute, KubeClusterStateReader,
};
pub use discovery::{ConfigMapDiscovery, KubeConfigMapDiscovery};
pub use endpoint::{resolve_admin_url, EndpointError};
pub use kube_api::{GrafanaApi, KubeGrafanaApi};
pub use reconcile::reconcile;
pub use status::{apply_status, StatusOutcome};
pub use types::{
    BackoffState, ClusterApiError, CycleOutcome, ObjectId, Reconciler, ReconcilerError, Requeue,
    StatusError,
};
