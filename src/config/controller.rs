//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Fixed delay before the next reconciliation cycle (seconds)
    pub requeue_delay_secs: u64,
    /// HTTP port for metrics, probes and the published state
    pub metrics_port: u16,
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Minimum backoff for errors that reach the scheduler (seconds)
    pub backoff_min_secs: u64,
    /// Maximum backoff for errors that reach the scheduler (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting the watch stream after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            requeue_delay_secs: DEFAULT_REQUEUE_DELAY_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            watch_namespace: None,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        use crate::constants::*;
        Self {
            requeue_delay_secs: parse_or(&lookup, "REQUEUE_DELAY_SECS", DEFAULT_REQUEUE_DELAY_SECS),
            metrics_port: parse_or(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            backoff_min_secs: parse_or(&lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: parse_or(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: parse_or(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            max_concurrent_reconciliations: parse_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
        }
    }

    /// Get the fixed requeue duration
    pub fn requeue_delay(&self) -> Duration {
        Duration::from_secs(self.requeue_delay_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read a key and parse it, or return the default value
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ControllerConfig::from_lookup(|_| None);
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.requeue_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_values_are_read() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("REQUEUE_DELAY_SECS", "30"),
            ("METRICS_PORT", "9090"),
            ("WATCH_NAMESPACE", "monitoring"),
        ]));
        assert_eq!(config.requeue_delay_secs, 30);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.watch_namespace.as_deref(), Some("monitoring"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("REQUEUE_DELAY_SECS", "soon"),
            ("METRICS_PORT", "99999"),
            ("WATCH_NAMESPACE", "  "),
        ]));
        assert_eq!(config.requeue_delay_secs, 10);
        assert_eq!(config.metrics_port, 8080);
        assert_eq!(config.watch_namespace, None);
    }
}
