//! # Runtime
//!
//! - `initialization`: tracing, metrics, HTTP server and client setup
//! - `watch_loop`: the `kube_runtime::Controller` driving reconciliation
//! - `error_policy`: backoff for errors that reach the scheduler

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{init_tracing, initialize, InitializationResult};
pub use watch_loop::{run_watch_loop, WatchedApis};
