//! # Cluster State
//!
//! Reads the network surfaces that belong to a Grafana instance: the Service,
//! the Ingress and, on OpenShift, the Route. A missing object is recorded as
//! absent rather than treated as an error.

use crate::constants::{GRAFANA_INGRESS_NAME, GRAFANA_ROUTE_NAME, GRAFANA_SERVICE_NAME};
use crate::crd::Grafana;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// OpenShift Route exposing Grafana, reduced to what endpoint resolution needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrafanaRoute {
    pub host: String,
}

/// Observed cluster state, read fresh for every cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterStateSnapshot {
    pub route: Option<GrafanaRoute>,
    pub ingress: Option<Ingress>,
    pub service: Option<Service>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStateReader: Send + Sync {
    async fn read_state(&self, grafana: &Grafana) -> Result<ClusterStateSnapshot>;
}

#[derive(Clone)]
pub struct KubeClusterStateReader {
    client: Client,
}

impl std::fmt::Debug for KubeClusterStateReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterStateReader").finish_non_exhaustive()
    }
}

impl KubeClusterStateReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn read_route(&self, namespace: &str) -> Result<Option<GrafanaRoute>> {
        let gvk = GroupVersionKind::gvk("route.openshift.io", "v1", "Route");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "routes");
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);

        let route = get_optional(&api, GRAFANA_ROUTE_NAME)
            .await
            .context("error reading route")?;
        Ok(route.map(|r| GrafanaRoute {
            host: r.data["spec"]["host"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        }))
    }
}

/// Fetch an object by name; 404 means absent
async fn get_optional<K>(api: &Api<K>, name: &str) -> Result<Option<K>, kube::Error>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ClusterStateReader for KubeClusterStateReader {
    async fn read_state(&self, grafana: &Grafana) -> Result<ClusterStateSnapshot> {
        let namespace = grafana.namespace().unwrap_or_else(|| "default".to_string());

        let services: Api<Service> = Api::namespaced(self.client.clone(), &namespace);
        let service = get_optional(&services, GRAFANA_SERVICE_NAME)
            .await
            .context("error reading service")?;

        let ingresses: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        let ingress = get_optional(&ingresses, GRAFANA_INGRESS_NAME)
            .await
            .context("error reading ingress")?;

        let route = self.read_route(&namespace).await?;

        debug!(
            namespace = namespace.as_str(),
            service = service.is_some(),
            ingress = ingress.is_some(),
            route = route.is_some(),
            "Read cluster state"
        );

        Ok(ClusterStateSnapshot {
            route,
            ingress,
            service,
        })
    }
}
