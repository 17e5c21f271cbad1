//! # Command Line
//!
//! ```bash
//! # Run the controller (default)
//! grafana-operator run --namespace monitoring
//!
//! # Print the Grafana CRD
//! grafana-operator crd | kubectl apply -f -
//! ```
//!
//! Flags passed to `run` override the environment configuration.

use crate::config::ControllerConfig;
use crate::crd::Grafana;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kube::core::CustomResourceExt;

/// Grafana controller
#[derive(Debug, Parser)]
#[command(name = "grafana-operator", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the controller
    Run(RunArgs),
    /// Print the Grafana CustomResourceDefinition as YAML
    Crd,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Namespace to watch (defaults to all namespaces)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Port for metrics, probes and /state
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Fixed requeue delay in seconds
    #[arg(long)]
    pub requeue_delay_secs: Option<u64>,

    /// Maximum concurrent reconciliations
    #[arg(long)]
    pub max_concurrent_reconciliations: Option<u16>,
}

impl RunArgs {
    /// Apply flags on top of a configuration loaded from the environment
    #[must_use]
    pub fn apply(&self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(namespace) = &self.namespace {
            config.watch_namespace = Some(namespace.clone());
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(delay) = self.requeue_delay_secs {
            config.requeue_delay_secs = delay;
        }
        if let Some(max) = self.max_concurrent_reconciliations {
            config.max_concurrent_reconciliations = max;
        }
        config
    }
}

/// Render the Grafana CRD as YAML
pub fn crd_yaml() -> Result<String> {
    serde_yaml::to_string(&Grafana::crd()).context("Failed to serialize CRD to YAML")
}
