//! # Operator Config Store
//!
//! Process-wide state shared between reconciliation cycles and between the
//! Grafana controller and the dashboard controller.
//!
//! The store is created once at startup and injected (as `Arc`) into every
//! component that needs it. Each public operation takes the lock exactly once,
//! so operations are atomic individually; nothing holds the lock across a
//! whole reconciliation cycle. Writers only touch the entries they name,
//! which lets unrelated cycles update the store concurrently without
//! clobbering each other.

use crate::constants::CONFIG_DASHBOARDS_SYNCED;
use crate::crd::{DashboardMap, GrafanaDashboardRef};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Value stored under a config key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Default)]
struct StoreInner {
    values: HashMap<String, ConfigValue>,
    dashboards: Option<DashboardMap>,
}

#[derive(Debug, Default)]
pub struct OperatorConfigStore {
    inner: Mutex<StoreInner>,
}

impl OperatorConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the store, recovering from a poisoned lock
    ///
    /// A panic in another holder cannot leave `StoreInner` half-written because
    /// every mutation is a single map operation.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Operator config store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn set_item(&self, key: &str, value: ConfigValue) {
        self.lock().values.insert(key.to_string(), value);
    }

    /// Remove a config item, returning the previous value
    pub fn remove_item(&self, key: &str) -> Option<ConfigValue> {
        self.lock().values.remove(key)
    }

    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<ConfigValue> {
        self.lock().values.get(key).cloned()
    }

    /// Read a boolean item; missing or non-boolean values yield `default`
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.lock().values.get(key) {
            Some(ConfigValue::Bool(b)) => *b,
            _ => default,
        }
    }

    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.lock().values.get(key) {
            Some(ConfigValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        match self.lock().values.get(key) {
            Some(ConfigValue::List(l)) => Some(l.clone()),
            _ => None,
        }
    }

    /// Whether the dashboard controller has synced dashboards since the last invalidation
    #[must_use]
    pub fn dashboards_synced(&self) -> bool {
        self.get_bool(CONFIG_DASHBOARDS_SYNCED, false)
    }

    pub fn set_dashboards_synced(&self, synced: bool) {
        self.set_item(CONFIG_DASHBOARDS_SYNCED, ConfigValue::Bool(synced));
    }

    /// Snapshot of the dashboard map; `None` until first initialized
    #[must_use]
    pub fn dashboards(&self) -> Option<DashboardMap> {
        self.lock().dashboards.clone()
    }

    /// Initialize the dashboard map to empty if it has never been set
    ///
    /// Returns true when this call created the map.
    pub fn ensure_dashboards(&self) -> bool {
        let mut inner = self.lock();
        if inner.dashboards.is_some() {
            return false;
        }
        inner.dashboards = Some(DashboardMap::new());
        true
    }

    /// Replace the dashboards of one namespace, leaving all other namespaces untouched
    pub fn merge_dashboards(&self, namespace: &str, refs: Vec<GrafanaDashboardRef>) {
        let mut inner = self.lock();
        let dashboards = inner.dashboards.get_or_insert_with(DashboardMap::new);
        if refs.is_empty() {
            dashboards.remove(namespace);
        } else {
            dashboards.insert(namespace.to_string(), refs);
        }
    }

    /// Add or replace a single dashboard reference
    pub fn upsert_dashboard(&self, dashboard: GrafanaDashboardRef) {
        let mut inner = self.lock();
        let refs = inner
            .dashboards
            .get_or_insert_with(DashboardMap::new)
            .entry(dashboard.namespace.clone())
            .or_default();
        match refs.iter_mut().find(|r| r.name == dashboard.name) {
            Some(existing) => *existing = dashboard,
            None => refs.push(dashboard),
        }
    }

    /// Remove a single dashboard reference; returns true if it existed
    pub fn remove_dashboard(&self, namespace: &str, name: &str) -> bool {
        let mut inner = self.lock();
        let Some(dashboards) = inner.dashboards.as_mut() else {
            return false;
        };
        let Some(refs) = dashboards.get_mut(namespace) else {
            return false;
        };
        let before = refs.len();
        refs.retain(|r| r.name != name);
        let removed = refs.len() != before;
        if refs.is_empty() {
            dashboards.remove(namespace);
        }
        removed
    }

    /// Force a full dashboard resync by the dashboard controller
    ///
    /// Clears the sync flag and every known dashboard hash. The references
    /// themselves are kept so the dashboard controller knows what to re-import.
    pub fn invalidate_dashboards(&self) {
        let mut inner = self.lock();
        inner
            .values
            .insert(CONFIG_DASHBOARDS_SYNCED.to_string(), ConfigValue::Bool(false));
        if let Some(dashboards) = inner.dashboards.as_mut() {
            for dashboard in dashboards.values_mut().flatten() {
                dashboard.hash.clear();
            }
        }
        debug!("Invalidated cached dashboards");
    }

    /// Forget all dashboards, used when the Grafana instance is gone
    pub fn cleanup(&self) {
        let mut inner = self.lock();
        inner
            .values
            .insert(CONFIG_DASHBOARDS_SYNCED.to_string(), ConfigValue::Bool(false));
        inner.dashboards = Some(DashboardMap::new());
        debug!("Cleared cached dashboards");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn dashboard(namespace: &str, name: &str, hash: &str) -> GrafanaDashboardRef {
        GrafanaDashboardRef {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: format!("{name}-uid"),
            hash: hash.to_string(),
            ..GrafanaDashboardRef::default()
        }
    }

    #[test]
    fn test_typed_getters_ignore_other_variants() {
        let store = OperatorConfigStore::new();
        store.set_item("k", ConfigValue::Text("v".to_string()));
        assert!(store.get_bool("k", true));
        assert_eq!(store.get_text("k").as_deref(), Some("v"));
        assert_eq!(store.get_list("k"), None);
    }

    #[test]
    fn test_ensure_dashboards_only_once() {
        let store = OperatorConfigStore::new();
        assert_eq!(store.dashboards(), None);
        assert!(store.ensure_dashboards());
        store.merge_dashboards("ns", vec![dashboard("ns", "a", "h")]);
        assert!(!store.ensure_dashboards());
        assert_eq!(store.dashboards().unwrap()["ns"].len(), 1);
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let store = OperatorConfigStore::new();
        store.upsert_dashboard(dashboard("ns", "a", "h1"));
        store.upsert_dashboard(dashboard("ns", "a", "h2"));
        store.upsert_dashboard(dashboard("ns", "b", "h3"));
        let ns = store.dashboards().unwrap().remove("ns").unwrap();
        assert_eq!(ns.len(), 2);
        assert_eq!(ns[0].hash, "h2");
    }

    #[test]
    fn test_remove_last_dashboard_drops_namespace() {
        let store = OperatorConfigStore::new();
        store.upsert_dashboard(dashboard("ns", "a", "h"));
        assert!(store.remove_dashboard("ns", "a"));
        assert!(!store.remove_dashboard("ns", "a"));
        assert!(store.dashboards().unwrap().is_empty());
    }

    #[test]
    fn test_invalidate_clears_hashes_and_flag() {
        let store = OperatorConfigStore::new();
        store.merge_dashboards("ns", vec![dashboard("ns", "a", "h")]);
        store.set_dashboards_synced(true);

        store.invalidate_dashboards();

        assert!(!store.dashboards_synced());
        let refs = store.dashboards().unwrap().remove("ns").unwrap();
        assert_eq!(refs[0].hash, "");
        assert_eq!(refs[0].name, "a");
    }

    #[test]
    fn test_cleanup_empties_dashboards() {
        let store = OperatorConfigStore::new();
        store.merge_dashboards("ns", vec![dashboard("ns", "a", "h")]);
        store.set_dashboards_synced(true);
        store.cleanup();
        assert!(!store.dashboards_synced());
        assert_eq!(store.dashboards(), Some(DashboardMap::new()));
    }

    #[test]
    fn test_concurrent_merges_do_not_clobber() {
        let store = Arc::new(OperatorConfigStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let ns = format!("ns-{i}");
                    store.merge_dashboards(&ns, vec![dashboard(&ns, "d", "h")]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.dashboards().unwrap().len(), 8);
    }
}
