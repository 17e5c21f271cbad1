//! # Custom Resource Definitions
//!
//! CRD types for the Grafana controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Grafana` CRD specification and spec-derived lookups
//! - `selector.rs` - Label selectors handed to the dashboard controller
//! - `status.rs` - Status types persisted on the resource

mod selector;
mod spec;
mod status;

pub use selector::{render_selectors, LabelSelector, LabelSelectorRequirement};
pub use spec::{
    Grafana, GrafanaClient, GrafanaConfig, GrafanaConfigServer, GrafanaIngress, GrafanaService,
    GrafanaSpec,
};
pub use status::{DashboardMap, GrafanaDashboardRef, GrafanaPhase, GrafanaStatus};
