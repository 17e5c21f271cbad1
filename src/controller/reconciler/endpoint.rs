//! # Endpoint Resolution
//!
//! Picks the URL dependent controllers use to reach the Grafana API.
//!
//! Priority, first match wins:
//!
//! 1. Route host, unless `client.preferService` is set
//! 2. Ingress, unless `client.preferService` is set: the hostname override
//!    from the spec, else the first load-balancer entry
//! 3. Service: cluster IP when assigned, else the service DNS name
//!
//! Route and ingress URLs use `https`, service URLs use `http` with the
//! Grafana port.

use crate::constants::{GRAFANA_SERVICE_NAME, HEADLESS_CLUSTER_IP};
use crate::controller::reconciler::cluster_state::ClusterStateSnapshot;
use crate::crd::GrafanaSpec;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("no reachable endpoint")]
    NoReachableEndpoint,
}

pub fn resolve_admin_url(
    snapshot: &ClusterStateSnapshot,
    spec: &GrafanaSpec,
) -> Result<String, EndpointError> {
    let prefer_service = spec.prefer_service();

    if !prefer_service {
        if let Some(route) = &snapshot.route {
            return Ok(format!("https://{}", route.host));
        }

        if let Some(ingress) = &snapshot.ingress {
            if let Some(hostname) = spec.ingress_hostname() {
                return Ok(format!("https://{hostname}"));
            }
            if let Some(address) = first_load_balancer_address(ingress) {
                return Ok(format!("https://{address}"));
            }
        }
    }

    if let Some(service) = &snapshot.service {
        return Ok(service_url(service, spec.grafana_port()));
    }

    Err(EndpointError::NoReachableEndpoint)
}

/// Address of the first load-balancer entry only; later entries are never consulted
fn first_load_balancer_address(ingress: &Ingress) -> Option<&str> {
    let entry = ingress
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .first()?;

    match entry.hostname.as_deref() {
        Some(hostname) if !hostname.is_empty() => Some(hostname),
        _ => entry.ip.as_deref().filter(|ip| !ip.is_empty()),
    }
}

fn service_url(service: &Service, port: u16) -> String {
    let cluster_ip = service
        .spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != HEADLESS_CLUSTER_IP);

    match cluster_ip {
        Some(ip) => format!("http://{ip}:{port}"),
        None => {
            let name = service
                .metadata
                .name
                .as_deref()
                .unwrap_or(GRAFANA_SERVICE_NAME);
            format!("http://{name}:{port}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::cluster_state::GrafanaRoute;
    use crate::crd::{GrafanaClient, GrafanaConfig, GrafanaConfigServer, GrafanaIngress};
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::api::networking::v1::{
        IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressStatus,
    };
    use kube::api::ObjectMeta;

    fn route(host: &str) -> Option<GrafanaRoute> {
        Some(GrafanaRoute {
            host: host.to_string(),
        })
    }

    fn service(cluster_ip: Option<&str>) -> Option<Service> {
        Some(Service {
            metadata: ObjectMeta {
                name: Some("grafana-service".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: cluster_ip.map(str::to_string),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        })
    }

    fn ingress(entries: Vec<(&str, &str)>) -> Option<Ingress> {
        let entries = entries
            .into_iter()
            .map(|(hostname, ip)| IngressLoadBalancerIngress {
                hostname: Some(hostname.to_string()),
                ip: Some(ip.to_string()),
                ..IngressLoadBalancerIngress::default()
            })
            .collect();
        Some(Ingress {
            status: Some(IngressStatus {
                load_balancer: Some(IngressLoadBalancerStatus {
                    ingress: Some(entries),
                }),
            }),
            ..Ingress::default()
        })
    }

    fn prefer_service(spec: GrafanaSpec) -> GrafanaSpec {
        GrafanaSpec {
            client: Some(GrafanaClient {
                prefer_service: true,
                ..GrafanaClient::default()
            }),
            ..spec
        }
    }

    #[test]
    fn test_route_wins() {
        let snapshot = ClusterStateSnapshot {
            route: route("grafana.apps.example.com"),
            ingress: ingress(vec![("lb.example.com", "")]),
            service: service(Some("10.0.0.1")),
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &GrafanaSpec::default()).unwrap(),
            "https://grafana.apps.example.com"
        );
    }

    #[test]
    fn test_prefer_service_skips_route_and_ingress() {
        let snapshot = ClusterStateSnapshot {
            route: route("grafana.apps.example.com"),
            ingress: ingress(vec![("lb.example.com", "")]),
            service: service(Some("10.0.0.1")),
        };
        let spec = prefer_service(GrafanaSpec::default());
        assert_eq!(
            resolve_admin_url(&snapshot, &spec).unwrap(),
            "http://10.0.0.1:3000"
        );
    }

    #[test]
    fn test_ingress_hostname_override() {
        let snapshot = ClusterStateSnapshot {
            ingress: ingress(vec![("lb.example.com", "10.0.0.5")]),
            ..ClusterStateSnapshot::default()
        };
        let spec = GrafanaSpec {
            ingress: Some(GrafanaIngress {
                enabled: true,
                hostname: Some("grafana.example.com".to_string()),
                ..GrafanaIngress::default()
            }),
            ..GrafanaSpec::default()
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &spec).unwrap(),
            "https://grafana.example.com"
        );
    }

    #[test]
    fn test_ingress_ip_when_hostname_empty() {
        let snapshot = ClusterStateSnapshot {
            ingress: ingress(vec![("", "10.0.0.5")]),
            ..ClusterStateSnapshot::default()
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &GrafanaSpec::default()).unwrap(),
            "https://10.0.0.5"
        );
    }

    #[test]
    fn test_ingress_only_first_entry_is_used() {
        let snapshot = ClusterStateSnapshot {
            ingress: ingress(vec![("", "10.0.0.5"), ("lb.example.com", "")]),
            ..ClusterStateSnapshot::default()
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &GrafanaSpec::default()).unwrap(),
            "https://10.0.0.5"
        );
    }

    #[test]
    fn test_ingress_without_entries_falls_through_to_service() {
        let snapshot = ClusterStateSnapshot {
            ingress: ingress(vec![]),
            service: service(Some("10.0.0.1")),
            ..ClusterStateSnapshot::default()
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &GrafanaSpec::default()).unwrap(),
            "http://10.0.0.1:3000"
        );
    }

    #[test]
    fn test_empty_first_entry_falls_through_to_service() {
        let snapshot = ClusterStateSnapshot {
            ingress: ingress(vec![("", ""), ("lb.example.com", "10.0.0.5")]),
            service: service(Some("10.0.0.1")),
            ..ClusterStateSnapshot::default()
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &GrafanaSpec::default()).unwrap(),
            "http://10.0.0.1:3000"
        );

        let without_service = ClusterStateSnapshot {
            service: None,
            ..snapshot
        };
        assert_eq!(
            resolve_admin_url(&without_service, &GrafanaSpec::default()),
            Err(EndpointError::NoReachableEndpoint)
        );
    }

    #[test]
    fn test_headless_service_uses_name_and_port() {
        let snapshot = ClusterStateSnapshot {
            service: service(Some("None")),
            ..ClusterStateSnapshot::default()
        };
        let spec = GrafanaSpec {
            config: Some(GrafanaConfig {
                server: Some(GrafanaConfigServer {
                    http_port: Some("8443".to_string()),
                }),
            }),
            ..GrafanaSpec::default()
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &spec).unwrap(),
            "http://grafana-service:8443"
        );
    }

    #[test]
    fn test_service_without_cluster_ip_uses_name() {
        let snapshot = ClusterStateSnapshot {
            service: service(None),
            ..ClusterStateSnapshot::default()
        };
        assert_eq!(
            resolve_admin_url(&snapshot, &GrafanaSpec::default()).unwrap(),
            "http://grafana-service:3000"
        );
    }

    #[test]
    fn test_no_surfaces_is_an_error() {
        let err = resolve_admin_url(&ClusterStateSnapshot::default(), &GrafanaSpec::default())
            .unwrap_err();
        assert_eq!(err, EndpointError::NoReachableEndpoint);
        assert_eq!(err.to_string(), "no reachable endpoint");
    }

    #[test]
    fn test_prefer_service_without_service_is_an_error() {
        let snapshot = ClusterStateSnapshot {
            route: route("grafana.apps.example.com"),
            ..ClusterStateSnapshot::default()
        };
        let spec = prefer_service(GrafanaSpec::default());
        assert!(resolve_admin_url(&snapshot, &spec).is_err());
    }
}
