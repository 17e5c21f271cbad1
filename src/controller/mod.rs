//! # Controller
//!
//! Core controller modules for the Grafana controller.
//!
//! - `backoff`: Fibonacci backoff for errors that reach the scheduler
//! - `events`: Kubernetes event recording
//! - `publisher`: Controller state broadcast to dependent controllers
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics, health checks and the published state
//! - `store`: Process-wide operator config store

pub mod backoff;
pub mod events;
pub mod publisher;
pub mod reconciler;
pub mod server;
pub mod store;
