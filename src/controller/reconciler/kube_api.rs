//! # Grafana API
//!
//! Access to the managed `Grafana` objects: read by identity and conditional
//! status writes.

use crate::constants::CONTROLLER_NAME;
use crate::controller::reconciler::types::{ClusterApiError, ObjectId};
use crate::crd::Grafana;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GrafanaApi: Send + Sync {
    async fn get(&self, id: &ObjectId) -> Result<Grafana, ClusterApiError>;

    /// Write `grafana.status`, failing with `Conflict` when the object's
    /// resource version is stale
    async fn update_status(&self, grafana: &Grafana) -> Result<Grafana, ClusterApiError>;
}

#[derive(Clone)]
pub struct KubeGrafanaApi {
    client: Client,
}

impl std::fmt::Debug for KubeGrafanaApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeGrafanaApi").finish_non_exhaustive()
    }
}

impl KubeGrafanaApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Grafana> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Merge-patch parameters for status writes, attributed to the controller
fn status_patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(CONTROLLER_NAME.to_string()),
        ..PatchParams::default()
    }
}

#[async_trait]
impl GrafanaApi for KubeGrafanaApi {
    async fn get(&self, id: &ObjectId) -> Result<Grafana, ClusterApiError> {
        Ok(self.api(&id.namespace).get(&id.name).await?)
    }

    async fn update_status(&self, grafana: &Grafana) -> Result<Grafana, ClusterApiError> {
        let id = ObjectId::from_resource(grafana);

        // Carrying the resource version turns the merge patch into a
        // conditional write: the API server answers 409 when it is stale.
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": grafana.resource_version(),
            },
            "status": grafana.status,
        });

        debug!(resource = %id, "Patching Grafana status");
        Ok(self
            .api(&id.namespace)
            .patch_status(
                &id.name,
                &status_patch_params(),
                &Patch::Merge(patch),
            )
            .await?)
    }
}
