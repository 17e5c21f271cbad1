//! # Grafana Controller
//!
//! Kubernetes controller that keeps `Grafana` resources converged and
//! publishes their admin endpoint and readiness to dependent controllers.
//!
//! ## Overview
//!
//! 1. **Watching Grafana resources** - and the Services and Ingresses they own
//! 2. **Converging network surfaces** - server-side applies the Service and Ingress
//! 3. **Tracking status** - `reconciling` or `failing` with a message
//! 4. **Publishing state** - admin URL, readiness and client settings for the
//!    dashboard controller
//!
//! See the [README.md](../README.md) for configuration.

use anyhow::Result;
use clap::Parser;
use grafana_operator::cli::{crd_yaml, Cli, Commands, RunArgs};
use grafana_operator::config::ControllerConfig;
use grafana_operator::runtime::{init_tracing, initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Crd) => {
            print!("{}", crd_yaml()?);
            Ok(())
        }
        Some(Commands::Run(args)) => run(&args).await,
        None => run(&RunArgs::default()).await,
    }
}

async fn run(args: &RunArgs) -> Result<()> {
    init_tracing();

    let config = args.apply(ControllerConfig::from_env());
    let init = initialize(&config).await?;

    run_watch_loop(init.apis, init.reconciler, init.server_state, &config).await
}
