//! # Grafana Spec
//!
//! Main CRD specification types and the pure lookups derived from them.

use crate::constants::{DEFAULT_CLIENT_TIMEOUT_SECONDS, DEFAULT_GRAFANA_PORT};
use crate::crd::LabelSelector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grafana Custom Resource Definition
///
/// Declares a Grafana instance the controller keeps converging.
///
/// # Example
///
/// ```yaml
/// apiVersion: integreatly.org/v1alpha1
/// kind: Grafana
/// metadata:
///   name: grafana
///   namespace: monitoring
/// spec:
///   dashboardLabelSelector:
///     - matchLabels:
///         app: grafana
///   client:
///     timeoutSeconds: 10
///     preferService: false
///   ingress:
///     enabled: true
///     hostname: grafana.example.com
///   config:
///     server:
///       httpPort: "3000"
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Grafana",
    group = "integreatly.org",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::GrafanaStatus",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Message", "type":"string", "jsonPath":".status.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaSpec {
    /// Selectors for the dashboards the dashboard controller should import
    #[serde(default)]
    pub dashboard_label_selector: Vec<LabelSelector>,
    /// Namespace selector for dashboards
    #[serde(default)]
    pub dashboard_namespace_selector: Option<LabelSelector>,
    /// Settings for clients talking to this Grafana instance
    #[serde(default)]
    pub client: Option<GrafanaClient>,
    /// Ingress exposure
    #[serde(default)]
    pub ingress: Option<GrafanaIngress>,
    /// Service customisation
    #[serde(default)]
    pub service: Option<GrafanaService>,
    /// Subset of grafana.ini the controller needs to know about
    #[serde(default)]
    pub config: Option<GrafanaConfig>,
}

/// Client settings handed to dependent controllers
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaClient {
    /// Request timeout in seconds; negative values fall back to the default
    #[serde(default)]
    pub timeout_seconds: Option<i32>,
    /// Skip route and ingress and reach Grafana through its Service
    #[serde(default)]
    pub prefer_service: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaIngress {
    #[serde(default)]
    pub enabled: bool,
    /// Hostname used for the ingress rule and the admin URL
    #[serde(default)]
    pub hostname: Option<String>,
    /// Path of the ingress rule (default "/")
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub ingress_class_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaService {
    /// Service type (default "ClusterIP")
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    /// Extra labels merged into the Service labels
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaConfig {
    #[serde(default)]
    pub server: Option<GrafanaConfigServer>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaConfigServer {
    /// `http_port` from grafana.ini, kept as a string like the ini value
    #[serde(default)]
    pub http_port: Option<String>,
}

impl GrafanaSpec {
    /// Port Grafana listens on
    ///
    /// Falls back to 3000 when `config.server.httpPort` is unset or not a port number.
    #[must_use]
    pub fn grafana_port(&self) -> u16 {
        self.config
            .as_ref()
            .and_then(|c| c.server.as_ref())
            .and_then(|s| s.http_port.as_deref())
            .and_then(|p| p.trim().parse::<u16>().ok())
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_GRAFANA_PORT)
    }

    /// Client timeout published to dependent controllers, in seconds
    ///
    /// Negative overrides are clamped to the default.
    #[must_use]
    pub fn effective_client_timeout(&self) -> i32 {
        match self.client.as_ref().and_then(|c| c.timeout_seconds) {
            Some(seconds) if seconds >= 0 => seconds,
            _ => DEFAULT_CLIENT_TIMEOUT_SECONDS,
        }
    }

    #[must_use]
    pub fn prefer_service(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.prefer_service)
    }

    /// Hostname override for the ingress, ignoring empty strings
    #[must_use]
    pub fn ingress_hostname(&self) -> Option<&str> {
        self.ingress
            .as_ref()
            .and_then(|i| i.hostname.as_deref())
            .filter(|h| !h.is_empty())
    }

    #[must_use]
    pub fn ingress_enabled(&self) -> bool {
        self.ingress.as_ref().is_some_and(|i| i.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with_timeout(timeout: Option<i32>) -> GrafanaSpec {
        GrafanaSpec {
            client: Some(GrafanaClient {
                timeout_seconds: timeout,
                prefer_service: false,
            }),
            ..GrafanaSpec::default()
        }
    }

    fn spec_with_port(port: &str) -> GrafanaSpec {
        GrafanaSpec {
            config: Some(GrafanaConfig {
                server: Some(GrafanaConfigServer {
                    http_port: Some(port.to_string()),
                }),
            }),
            ..GrafanaSpec::default()
        }
    }

    #[test]
    fn test_timeout_defaults_without_client() {
        assert_eq!(GrafanaSpec::default().effective_client_timeout(), 5);
        assert_eq!(spec_with_timeout(None).effective_client_timeout(), 5);
    }

    #[test]
    fn test_negative_timeout_is_clamped() {
        assert_eq!(spec_with_timeout(Some(-5)).effective_client_timeout(), 5);
    }

    #[test]
    fn test_explicit_timeout_is_kept() {
        assert_eq!(spec_with_timeout(Some(30)).effective_client_timeout(), 30);
        assert_eq!(spec_with_timeout(Some(0)).effective_client_timeout(), 0);
    }

    #[test]
    fn test_port_lookup() {
        assert_eq!(GrafanaSpec::default().grafana_port(), 3000);
        assert_eq!(spec_with_port("8443").grafana_port(), 8443);
        assert_eq!(spec_with_port("not-a-port").grafana_port(), 3000);
        assert_eq!(spec_with_port("0").grafana_port(), 3000);
    }

    #[test]
    fn test_empty_hostname_is_ignored() {
        let spec = GrafanaSpec {
            ingress: Some(GrafanaIngress {
                enabled: true,
                hostname: Some(String::new()),
                ..GrafanaIngress::default()
            }),
            ..GrafanaSpec::default()
        };
        assert_eq!(spec.ingress_hostname(), None);
        assert!(spec.ingress_enabled());
    }

    #[test]
    fn test_spec_deserializes_from_camel_case() {
        let yaml = r#"
dashboardLabelSelector:
  - matchLabels:
      app: grafana
client:
  timeoutSeconds: -5
  preferService: true
ingress:
  enabled: true
  hostname: grafana.example.com
config:
  server:
    httpPort: "3001"
"#;
        let spec: GrafanaSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.dashboard_label_selector.len(), 1);
        assert!(spec.prefer_service());
        assert_eq!(spec.effective_client_timeout(), 5);
        assert_eq!(spec.ingress_hostname(), Some("grafana.example.com"));
        assert_eq!(spec.grafana_port(), 3001);
    }
}
