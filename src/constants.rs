//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name reported on events, field managers and logs
pub const CONTROLLER_NAME: &str = "grafana-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Fixed delay before the next reconciliation cycle (seconds)
/// Applies to success, handled errors and teardown alike
pub const DEFAULT_REQUEUE_DELAY_SECS: u64 = 10;

/// Client timeout published to dependent controllers when the CR sets none (seconds)
pub const DEFAULT_CLIENT_TIMEOUT_SECONDS: i32 = 5;

/// Grafana HTTP port when `config.server.httpPort` is unset or invalid
pub const DEFAULT_GRAFANA_PORT: u16 = 3000;

/// Minimum backoff for errors that reach the scheduler (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Maximum backoff for errors that reach the scheduler (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default limit of reconciliations running at the same time
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Name of the Service created for a Grafana instance
pub const GRAFANA_SERVICE_NAME: &str = "grafana-service";

/// Name of the Ingress created for a Grafana instance
pub const GRAFANA_INGRESS_NAME: &str = "grafana-ingress";

/// Name of the OpenShift Route exposing a Grafana instance
pub const GRAFANA_ROUTE_NAME: &str = "grafana-route";

/// Label carried by every object owned by a Grafana instance
pub const GRAFANA_APP_LABEL: &str = "app";

/// Value of [`GRAFANA_APP_LABEL`]
pub const GRAFANA_APP_LABEL_VALUE: &str = "grafana";

/// Label marking ConfigMaps that carry jsonnet libraries
pub const JSONNET_LIBRARY_LABEL: &str = "grafana.integreatly.org/jsonnet-library";

/// Sentinel cluster IP of a headless Service
pub const HEADLESS_CLUSTER_IP: &str = "None";

/// Status message written after a successful cycle
pub const SUCCESS_MESSAGE: &str = "success";

/// Config store key: dashboards synced by the dashboard controller
pub const CONFIG_DASHBOARDS_SYNCED: &str = "grafana.dashboards.synced";

/// Config store key: rendered dashboard label selector
pub const CONFIG_DASHBOARD_LABEL_SELECTOR: &str = "grafana.dashboard.selector";

/// Config store key: names of discovered jsonnet library ConfigMaps
pub const CONFIG_JSONNET_LIBRARIES: &str = "grafana.jsonnet.libraries";
