//! envctl - Idempotent container provisioning and health supervision
//!
//! Brings a named LXD container hosting the Deep Coder IDE into its
//! desired running state, and probes the deployed service's health on a
//! schedule, recovering it on failure.

mod core;
mod runtime;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::config::{DEFAULT_CONTAINER, DEFAULT_HEALTH_URL, DEFAULT_TAIL_LINES};
use crate::core::{converge, DeployConfig};
use crate::runtime::CliRuntime;

#[derive(Parser)]
#[command(name = "envctl", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the environment to its desired running state, creating or
    /// updating it as needed
    Up {
        /// Target container name
        #[arg(default_value = DEFAULT_CONTAINER)]
        name: String,
    },
    /// Probe the deployed service's health endpoint once, restarting it
    /// and capturing diagnostics on failure
    Check {
        /// Target container name
        #[arg(default_value = DEFAULT_CONTAINER)]
        name: String,
        /// Health endpoint URL
        #[arg(default_value = DEFAULT_HEALTH_URL)]
        url: String,
        /// Journal lines captured when the service is degraded
        #[arg(default_value_t = DEFAULT_TAIL_LINES)]
        tail_lines: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let runtime = CliRuntime::new();

    match cli.command {
        Commands::Up { name } => {
            let config = DeployConfig::for_container(name);
            match converge(&runtime, &config).await {
                Ok(convergence) => {
                    info!(?convergence, "done");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("convergence failed: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Check {
            name,
            url,
            tail_lines,
        } => {
            let config = DeployConfig::for_container(name);
            let verdict = crate::core::health::check(&runtime, &config, &url, tail_lines).await;
            ExitCode::from(verdict.exit_code())
        }
    }
}

/// Initialize the logging system
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("envctl=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
