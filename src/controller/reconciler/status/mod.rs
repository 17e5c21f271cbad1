//! # Status Management
//!
//! Updates Grafana status with reconciliation results.

mod phase;

pub use phase::{apply_status, StatusOutcome};
