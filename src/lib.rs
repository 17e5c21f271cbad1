//! Grafana Controller Library
//!
//! Reconciliation core of the Grafana controller: the cycle that drives a
//! `Grafana` resource toward its declared state, the status tracker, the
//! admin endpoint resolver, and the state publisher dependent controllers
//! subscribe to.
//!
//! ## Quick Start
//!
//! ```rust
//! use grafana_operator::controller::publisher::StatePublisher;
//!
//! let publisher = StatePublisher::new();
//! let mut subscriber = publisher.subscribe();
//! assert!(!subscriber.latest().grafana_ready);
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
