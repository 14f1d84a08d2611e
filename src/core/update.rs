//! Updater - refreshes an existing environment, falling back to a full rebuild

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::runtime::ContainerRuntime;

use super::config::DeployConfig;
use super::provision::provision;
use super::step::{exec_checked, StepRunner};

/// How an update pass converged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The environment was refreshed in place
    Refreshed,
    /// The in-place refresh failed; the full Provisioner ran instead
    Delegated { reason: String },
}

/// Refresh an existing environment in place.
///
/// A missing or broken application checkout, an unreachable environment,
/// or a failed source synchronization all delegate to the full
/// Provisioner in the same invocation - the self-healing path. Rebuild
/// and restart after a successful sync are best-effort.
pub async fn update(
    runtime: &dyn ContainerRuntime,
    config: &DeployConfig,
) -> Result<UpdateOutcome> {
    info!(container = %config.container_name, "updating existing environment");

    match refresh_in_place(runtime, config) {
        Ok(()) => Ok(UpdateOutcome::Refreshed),
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(
                container = %config.container_name,
                reason = %reason,
                "in-place update failed, rebuilding"
            );
            provision(runtime, config).await?;
            Ok(UpdateOutcome::Delegated { reason })
        }
    }
}

fn refresh_in_place(runtime: &dyn ContainerRuntime, config: &DeployConfig) -> Result<()> {
    let name = config.container_name.as_str();

    let probe = runtime.exec(name, &format!("test -d {}/.git", config.app_dir))?;
    if !probe.success() {
        bail!("application checkout missing at {}", config.app_dir);
    }

    let mut steps = StepRunner::new();

    // Hard sync: local divergence is discarded, not merged.
    steps.must(
        "synchronize source",
        exec_checked(
            runtime,
            name,
            &format!(
                "cd {dir} && git fetch origin && git reset --hard origin/HEAD",
                dir = config.app_dir
            ),
        ),
    )?;

    steps.best_effort(
        "refresh python dependencies",
        exec_checked(
            runtime,
            name,
            &format!(
                "cd {dir} && .venv/bin/pip install -e . && \
                 .venv/bin/pip install -r backend/requirements.txt",
                dir = config.app_dir
            ),
        ),
    );

    steps.best_effort(
        "rebuild frontend",
        exec_checked(
            runtime,
            name,
            &format!(
                "cd {dir}/frontend && npm ci && npm run build",
                dir = config.app_dir
            ),
        ),
    );

    // The process may simply need a moment to re-register; a failed
    // restart is not grounds for a rebuild.
    steps.best_effort(
        "restart service",
        exec_checked(
            runtime,
            name,
            &format!("systemctl restart {}", config.service_name),
        ),
    );

    Ok(())
}
