//! # Grafana Status
//!
//! Status types for tracking reconciliation state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Installed dashboards keyed by the namespace they were imported from
pub type DashboardMap = BTreeMap<String, Vec<GrafanaDashboardRef>>;

/// Status of the Grafana resource
///
/// Compared as a whole to decide whether a status write is needed, so every
/// field must take part in `PartialEq`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaStatus {
    /// Current phase of reconciliation
    #[serde(default)]
    pub phase: Option<GrafanaPhase>,
    /// Human-readable outcome of the last cycle; the error text when failing
    #[serde(default)]
    pub message: Option<String>,
    /// Dashboards the dashboard controller has installed into this instance
    #[serde(default)]
    pub installed_dashboards: Option<DashboardMap>,
}

/// Coarse health indicator of a Grafana instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GrafanaPhase {
    /// Last cycle succeeded; the controller keeps re-checking
    Reconciling,
    /// Last cycle failed; `message` carries the reason
    Failing,
}

impl GrafanaPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GrafanaPhase::Reconciling => "reconciling",
            GrafanaPhase::Failing => "failing",
        }
    }
}

impl fmt::Display for GrafanaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a dashboard imported by the dashboard controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDashboardRef {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    /// Content hash; empty forces the dashboard controller to re-import
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default)]
    pub folder_name: Option<String>,
}
