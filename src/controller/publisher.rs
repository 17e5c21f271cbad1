//! # State Publisher
//!
//! Broadcasts the resolved runtime facts about a Grafana instance to
//! dependent controllers (the dashboard controller in particular).
//!
//! Backed by a `tokio::sync::watch` channel: every subscriber holds a single
//! slot containing the latest fact. Publishing never waits for subscribers,
//! a slow subscriber skips intermediate facts but always observes the most
//! recent one, and memory stays bounded regardless of subscriber speed.

use crate::crd::LabelSelector;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Fact published after every reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerState {
    pub dashboard_selectors: Vec<LabelSelector>,
    pub dashboard_namespace_selector: Option<LabelSelector>,
    /// URL the dashboard controller uses to reach the Grafana API
    pub admin_url: String,
    pub grafana_ready: bool,
    /// Client timeout in seconds
    pub client_timeout: i32,
}

impl ControllerState {
    /// Fact published on teardown and on handled failures
    #[must_use]
    pub fn not_ready() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct StatePublisher {
    tx: watch::Sender<ControllerState>,
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePublisher {
    /// Create a publisher whose initial fact is "not ready"
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControllerState::not_ready());
        Self { tx }
    }

    /// Publish a fact to all current and future subscribers
    ///
    /// Never blocks and succeeds even when nobody is subscribed.
    pub fn publish(&self, state: ControllerState) {
        debug!(
            ready = state.grafana_ready,
            admin_url = state.admin_url.as_str(),
            subscribers = self.tx.receiver_count(),
            "Publishing controller state"
        );
        self.tx.send_replace(state);
        crate::observability::metrics::increment_state_publishes();
    }

    #[must_use]
    pub fn subscribe(&self) -> StateSubscriber {
        StateSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Latest published fact
    #[must_use]
    pub fn current(&self) -> ControllerState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end held by a dependent controller
#[derive(Debug, Clone)]
pub struct StateSubscriber {
    rx: watch::Receiver<ControllerState>,
}

impl StateSubscriber {
    /// Latest fact, marking it as seen
    pub fn latest(&mut self) -> ControllerState {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for a fact newer than the last one seen
    ///
    /// Returns `None` once the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<ControllerState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Whether a fact has been published since the last one seen
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
