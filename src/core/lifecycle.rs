//! Lifecycle controller - one convergence pass per invocation

use anyhow::{Context, Result};
use tracing::info;

use crate::runtime::ContainerRuntime;

use super::config::DeployConfig;
use super::profile::{ensure_profile, ResourceProfile};
use super::provision::provision;
use super::update::{update, UpdateOutcome};

/// How a convergence pass brought the environment to its desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    /// A fresh environment was provisioned
    Provisioned,
    /// The existing environment was refreshed in place
    Updated,
    /// The in-place update failed and the environment was rebuilt
    Rebuilt { reason: String },
}

/// Bring the named environment to its desired running state.
///
/// `EnsureProfile -> {Exists? Update : Provision}` - exactly one decision
/// point, taken once. All retry and fallback logic lives in the child
/// components; a fatal error from any of them stops the sequence.
pub async fn converge(
    runtime: &dyn ContainerRuntime,
    config: &DeployConfig,
) -> Result<Convergence> {
    let profile = ResourceProfile::standard(&config.profile_name);
    ensure_profile(runtime, &profile)?;

    let exists = runtime
        .container_exists(&config.container_name)
        .context("failed to probe environment existence")?;

    let convergence = if exists {
        match update(runtime, config).await? {
            UpdateOutcome::Refreshed => Convergence::Updated,
            UpdateOutcome::Delegated { reason } => Convergence::Rebuilt { reason },
        }
    } else {
        provision(runtime, config).await?;
        Convergence::Provisioned
    };

    info!(container = %config.container_name, ?convergence, "environment converged");
    Ok(convergence)
}
