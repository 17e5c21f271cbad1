//! # Configuration
//!
//! Controller-level settings. Values come from environment variables with
//! defaults from [`crate::constants`]; command-line flags may override them.

mod controller;

pub use controller::ControllerConfig;
