//! # Cluster Actions
//!
//! Computes the actions that move the cluster toward a Grafana's declared
//! network surfaces and applies them.
//!
//! The diff only emits an action when the observed object differs from the
//! desired one in a field the controller owns, so a converged instance yields
//! an empty action set and no API writes.

use crate::constants::{
    CONTROLLER_NAME, GRAFANA_APP_LABEL, GRAFANA_APP_LABEL_VALUE, GRAFANA_INGRESS_NAME,
    GRAFANA_SERVICE_NAME,
};
use crate::controller::reconciler::cluster_state::ClusterStateSnapshot;
use crate::crd::Grafana;
use crate::observability;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{DeleteParams, ObjectMeta, Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";
const DEFAULT_INGRESS_PATH: &str = "/";
const GRAFANA_PORT_NAME: &str = "grafana";

/// A single change to apply to the cluster
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterAction {
    ApplyService(Box<Service>),
    ApplyIngress(Box<Ingress>),
    DeleteIngress,
}

impl ClusterAction {
    /// Short name used in logs and metric labels
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterAction::ApplyService(_) => "apply_service",
            ClusterAction::ApplyIngress(_) => "apply_ingress",
            ClusterAction::DeleteIngress => "delete_ingress",
        }
    }
}

/// Ordered actions computed for one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSet {
    actions: Vec<ClusterAction>,
}

impl ActionSet {
    pub fn push(&mut self, action: ClusterAction) {
        self.actions.push(action);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterAction> {
        self.actions.iter()
    }
}

impl FromIterator<ClusterAction> for ActionSet {
    fn from_iter<T: IntoIterator<Item = ClusterAction>>(iter: T) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

#[cfg_attr(test, automock)]
pub trait DesiredStateReconciler: Send + Sync {
    fn diff(&self, current: &ClusterStateSnapshot, grafana: &Grafana) -> ActionSet;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Apply every action in order, stopping at the first failure
    async fn run(&self, grafana: &Grafana, actions: &ActionSet) -> Result<()>;
}

/// Desired state of the Service and Ingress for a Grafana instance
#[derive(Debug, Clone, Copy, Default)]
pub struct GrafanaDesiredState;

impl DesiredStateReconciler for GrafanaDesiredState {
    fn diff(&self, current: &ClusterStateSnapshot, grafana: &Grafana) -> ActionSet {
        let mut actions = ActionSet::default();

        let service = desired_service(grafana);
        let service_converged = current
            .service
            .as_ref()
            .is_some_and(|observed| service_matches(observed, &service));
        if !service_converged {
            actions.push(ClusterAction::ApplyService(Box::new(service)));
        }

        if grafana.spec.ingress_enabled() {
            let ingress = desired_ingress(grafana);
            let ingress_converged = current
                .ingress
                .as_ref()
                .is_some_and(|observed| ingress_matches(observed, &ingress));
            if !ingress_converged {
                actions.push(ClusterAction::ApplyIngress(Box::new(ingress)));
            }
        } else if current.ingress.is_some() {
            actions.push(ClusterAction::DeleteIngress);
        }

        actions
    }
}

fn selector_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        GRAFANA_APP_LABEL.to_string(),
        GRAFANA_APP_LABEL_VALUE.to_string(),
    )])
}

fn desired_service(grafana: &Grafana) -> Service {
    let spec = &grafana.spec;
    let port = i32::from(spec.grafana_port());

    let mut labels = spec
        .service
        .as_ref()
        .and_then(|s| s.labels.clone())
        .unwrap_or_default();
    labels.extend(selector_labels());

    let service_type = spec
        .service
        .as_ref()
        .and_then(|s| s.type_.clone())
        .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string());

    Service {
        metadata: ObjectMeta {
            name: Some(GRAFANA_SERVICE_NAME.to_string()),
            namespace: grafana.namespace(),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(service_type),
            selector: Some(selector_labels()),
            ports: Some(vec![ServicePort {
                name: Some(GRAFANA_PORT_NAME.to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

fn desired_ingress(grafana: &Grafana) -> Ingress {
    let spec = &grafana.spec;
    let ingress = spec.ingress.clone().unwrap_or_default();
    let path = ingress
        .path
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_INGRESS_PATH.to_string());

    Ingress {
        metadata: ObjectMeta {
            name: Some(GRAFANA_INGRESS_NAME.to_string()),
            namespace: grafana.namespace(),
            labels: Some(selector_labels()),
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: ingress.ingress_class_name,
            rules: Some(vec![IngressRule {
                host: spec.ingress_hostname().map(str::to_string),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(path),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: GRAFANA_SERVICE_NAME.to_string(),
                                port: Some(ServiceBackendPort {
                                    number: Some(i32::from(spec.grafana_port())),
                                    ..ServiceBackendPort::default()
                                }),
                            }),
                            ..IngressBackend::default()
                        },
                    }],
                }),
            }]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

/// Whether the observed Service already carries every field the controller owns
fn service_matches(observed: &Service, desired: &Service) -> bool {
    let (Some(observed_spec), Some(desired_spec)) = (&observed.spec, &desired.spec) else {
        return false;
    };

    let labels_present = desired
        .labels()
        .iter()
        .all(|(k, v)| observed.labels().get(k) == Some(v));

    let ports_match = match (&observed_spec.ports, &desired_spec.ports) {
        (Some(observed_ports), Some(desired_ports)) => {
            observed_ports.len() == desired_ports.len()
                && observed_ports.iter().zip(desired_ports).all(|(o, d)| {
                    o.name == d.name && o.port == d.port && o.target_port == d.target_port
                })
        }
        _ => false,
    };

    labels_present
        && ports_match
        && observed_spec.type_.as_deref().unwrap_or(DEFAULT_SERVICE_TYPE)
            == desired_spec.type_.as_deref().unwrap_or(DEFAULT_SERVICE_TYPE)
        && observed_spec.selector == desired_spec.selector
}

fn ingress_matches(observed: &Ingress, desired: &Ingress) -> bool {
    let (Some(observed_spec), Some(desired_spec)) = (&observed.spec, &desired.spec) else {
        return false;
    };
    observed_spec.rules == desired_spec.rules
        && observed_spec.ingress_class_name == desired_spec.ingress_class_name
}

/// Applies actions with server-side apply, owned by the Grafana object
#[derive(Clone)]
pub struct KubeActionRunner {
    client: Client,
}

impl std::fmt::Debug for KubeActionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeActionRunner").finish_non_exhaustive()
    }
}

impl KubeActionRunner {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionRunner for KubeActionRunner {
    async fn run(&self, grafana: &Grafana, actions: &ActionSet) -> Result<()> {
        if actions.is_empty() {
            debug!("No cluster actions required");
            return Ok(());
        }

        let namespace = grafana.namespace().unwrap_or_else(|| "default".to_string());
        let owner = grafana.controller_owner_ref(&());
        let params = PatchParams::apply(CONTROLLER_NAME).force();

        for action in actions.iter() {
            info!(action = action.kind(), namespace = namespace.as_str(), "Running cluster action");
            match action {
                ClusterAction::ApplyService(service) => {
                    let mut service = service.as_ref().clone();
                    service.metadata.owner_references = owner.clone().map(|o| vec![o]);
                    let api: Api<Service> = Api::namespaced(self.client.clone(), &namespace);
                    api.patch(GRAFANA_SERVICE_NAME, &params, &Patch::Apply(&service))
                        .await
                        .context("failed to apply grafana service")?;
                }
                ClusterAction::ApplyIngress(ingress) => {
                    let mut ingress = ingress.as_ref().clone();
                    ingress.metadata.owner_references = owner.clone().map(|o| vec![o]);
                    let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
                    api.patch(GRAFANA_INGRESS_NAME, &params, &Patch::Apply(&ingress))
                        .await
                        .context("failed to apply grafana ingress")?;
                }
                ClusterAction::DeleteIngress => {
                    let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
                    match api.delete(GRAFANA_INGRESS_NAME, &DeleteParams::default()).await {
                        Ok(_) => {}
                        Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                            debug!("Ingress already gone");
                        }
                        Err(e) => return Err(e).context("failed to delete grafana ingress"),
                    }
                }
            }
            observability::metrics::increment_actions(action.kind());
        }

        Ok(())
    }
}
