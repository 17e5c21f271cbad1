//! # Config Map Discovery
//!
//! Finds the jsonnet library ConfigMaps next to a Grafana instance and records
//! their names in the operator config store for the dashboard controller.

use crate::constants::{CONFIG_JSONNET_LIBRARIES, JSONNET_LIBRARY_LABEL};
use crate::controller::store::{ConfigValue, OperatorConfigStore};
use crate::crd::Grafana;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigMapDiscovery: Send + Sync {
    async fn discover(&self, grafana: &Grafana) -> Result<()>;
}

pub struct KubeConfigMapDiscovery {
    client: Client,
    store: Arc<OperatorConfigStore>,
}

impl std::fmt::Debug for KubeConfigMapDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeConfigMapDiscovery").finish_non_exhaustive()
    }
}

impl KubeConfigMapDiscovery {
    pub fn new(client: Client, store: Arc<OperatorConfigStore>) -> Self {
        Self { client, store }
    }
}

/// Sorted, de-duplicated library names
fn library_names(config_maps: &[ConfigMap]) -> Vec<String> {
    let mut names: Vec<String> = config_maps.iter().map(|cm| cm.name_any()).collect();
    names.sort();
    names.dedup();
    names
}

#[async_trait]
impl ConfigMapDiscovery for KubeConfigMapDiscovery {
    async fn discover(&self, grafana: &Grafana) -> Result<()> {
        let namespace = grafana.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);

        let list = api
            .list(&ListParams::default().labels(JSONNET_LIBRARY_LABEL))
            .await
            .context("error listing jsonnet library config maps")?;

        let names = library_names(&list.items);
        debug!(
            namespace = namespace.as_str(),
            count = names.len(),
            "Discovered jsonnet libraries"
        );
        self.store
            .set_item(CONFIG_JSONNET_LIBRARIES, ConfigValue::List(names));
        Ok(())
    }
}
