//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `grafana_operator_reconciliations_total` - Total number of reconciliation cycles
//! - `grafana_operator_reconciliation_errors_total` - Errors returned to the scheduler
//! - `grafana_operator_reconciliation_failures_total` - Failures handled in-cycle (phase `failing`)
//! - `grafana_operator_teardowns_total` - Cycles that found the Grafana object deleted
//! - `grafana_operator_reconciliation_duration_seconds` - Duration of reconciliation cycles
//! - `grafana_operator_status_updates_total` - Status writes sent to the API server
//! - `grafana_operator_status_conflicts_total` - Status writes rejected with a conflict
//! - `grafana_operator_state_publishes_total` - Controller state facts published
//! - `grafana_operator_actions_total` - Cluster actions applied, by kind

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "grafana_operator_reconciliations_total",
        "Total number of reconciliation cycles",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "grafana_operator_reconciliation_errors_total",
        "Total number of reconciliation errors returned to the scheduler",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "grafana_operator_reconciliation_failures_total",
        "Total number of reconciliation failures recorded on the resource status",
    )
    .expect("Failed to create RECONCILIATION_FAILURES_TOTAL metric - this should never happen")
});

static TEARDOWNS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "grafana_operator_teardowns_total",
        "Total number of cycles that found the Grafana resource deleted",
    )
    .expect("Failed to create TEARDOWNS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "grafana_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static STATUS_UPDATES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "grafana_operator_status_updates_total",
        "Total number of status updates written",
    )
    .expect("Failed to create STATUS_UPDATES_TOTAL metric - this should never happen")
});

static STATUS_CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "grafana_operator_status_conflicts_total",
        "Total number of status updates rejected because of a stale resource version",
    )
    .expect("Failed to create STATUS_CONFLICTS_TOTAL metric - this should never happen")
});

static STATE_PUBLISHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "grafana_operator_state_publishes_total",
        "Total number of controller state facts published",
    )
    .expect("Failed to create STATE_PUBLISHES_TOTAL metric - this should never happen")
});

static ACTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "grafana_operator_actions_total",
            "Total number of cluster actions applied",
        ),
        &["action"],
    )
    .expect("Failed to create ACTIONS_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TEARDOWNS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(STATUS_UPDATES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATE_PUBLISHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACTIONS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn increment_reconciliation_failures() {
    RECONCILIATION_FAILURES_TOTAL.inc();
}

pub fn increment_teardowns() {
    TEARDOWNS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_status_updates() {
    STATUS_UPDATES_TOTAL.inc();
}

pub fn increment_status_conflicts() {
    STATUS_CONFLICTS_TOTAL.inc();
}

pub fn increment_state_publishes() {
    STATE_PUBLISHES_TOTAL.inc();
}

pub fn increment_actions(action: &str) {
    ACTIONS_TOTAL.with_label_values(&[action]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert!(RECONCILIATIONS_TOTAL.get() > before);
    }

    #[test]
    fn test_increment_status_conflicts() {
        let before = STATUS_CONFLICTS_TOTAL.get();
        increment_status_conflicts();
        assert!(STATUS_CONFLICTS_TOTAL.get() > before);
    }

    #[test]
    fn test_increment_actions_by_label() {
        let before = ACTIONS_TOTAL.with_label_values(&["apply_service"]).get();
        increment_actions("apply_service");
        assert!(ACTIONS_TOTAL.with_label_values(&["apply_service"]).get() > before);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        observe_reconciliation_duration(0.25);
        assert!(RECONCILIATION_DURATION.get_sample_count() >= 1);
    }
}
