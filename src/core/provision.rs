//! Provisioner - builds a new environment from the base image

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::runtime::ContainerRuntime;

use super::config::{DeployConfig, RuntimeConfig};
use super::service::ServiceDescriptor;
use super::step::{exec_checked, write_remote_file, StepOutcome, StepRunner};

/// Bring up a fresh environment: launch, wait for network, install
/// dependencies, fetch and build the application, write configuration,
/// activate the service, open the firewall.
///
/// Mandatory step failures abort with a fatal error naming the step;
/// best-effort steps (secondary dependencies, frontend build) are logged
/// and swallowed. When invoked as the Updater's rebuild fallback the
/// container already exists and the launch step is skipped - the rebuild
/// reconfigures it in place rather than deleting it.
pub async fn provision(
    runtime: &dyn ContainerRuntime,
    config: &DeployConfig,
) -> Result<Vec<StepOutcome>> {
    let name = config.container_name.as_str();
    info!(container = name, image = %config.image, "provisioning environment");

    let mut steps = StepRunner::new();

    let present = runtime.container_exists(name)?;
    if present {
        warn!(container = name, "environment already exists, reconfiguring in place");
    } else {
        steps.must(
            "launch environment",
            runtime
                .launch(&config.image, name, &config.profile_name)
                .map_err(Into::into),
        )?;
    }

    let address = steps.must("wait for network", wait_for_network(runtime, config).await)?;
    info!(container = name, address = %address, "network ready");

    steps.must(
        "install system dependencies",
        exec_checked(
            runtime,
            name,
            "export DEBIAN_FRONTEND=noninteractive && apt-get update -y && \
             apt-get install -y build-essential git curl python3 python3-venv python3-pip nodejs npm",
        ),
    )?;

    steps.must(
        "fetch application source",
        exec_checked(
            runtime,
            name,
            &format!(
                "rm -rf {dir} && git clone {repo} {dir}",
                dir = config.app_dir,
                repo = config.repo_url
            ),
        ),
    )?;

    steps.must(
        "install application",
        exec_checked(
            runtime,
            name,
            &format!(
                "cd {dir} && python3 -m venv .venv && .venv/bin/pip install --upgrade pip && \
                 .venv/bin/pip install -e .",
                dir = config.app_dir
            ),
        ),
    )?;

    steps.best_effort(
        "install backend requirements",
        exec_checked(
            runtime,
            name,
            &format!(
                "cd {dir} && .venv/bin/pip install -r backend/requirements.txt",
                dir = config.app_dir
            ),
        ),
    );

    steps.best_effort(
        "build frontend",
        exec_checked(
            runtime,
            name,
            &format!(
                "cd {dir}/frontend && npm ci && npm run build",
                dir = config.app_dir
            ),
        ),
    );

    let runtime_config = RuntimeConfig::default();
    steps.must(
        "write runtime configuration",
        write_remote_file(runtime, name, &config.env_file, &runtime_config.render()),
    )?;

    steps.must(
        "activate service",
        activate_service(runtime, config, &runtime_config),
    )?;

    steps.must(
        "open firewall",
        exec_checked(
            runtime,
            name,
            &format!(
                "ufw allow {port}/tcp && ufw --force enable",
                port = config.backend_port
            ),
        ),
    )?;

    let outcomes = steps.into_outcomes();
    let skipped: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.ok)
        .map(|o| o.label)
        .collect();
    if !skipped.is_empty() {
        warn!(container = name, ?skipped, "best-effort steps failed");
    }
    info!(container = name, "environment provisioned");
    Ok(outcomes)
}

/// Poll the environment's primary interface for an assigned IPv4 address.
///
/// Bounded: `network_wait_attempts` polls at `network_wait_interval`;
/// exhausting the bound is fatal and leaves the environment running but
/// unconfigured.
async fn wait_for_network(runtime: &dyn ContainerRuntime, config: &DeployConfig) -> Result<String> {
    let name = config.container_name.as_str();
    for attempt in 1..=config.network_wait_attempts {
        if let Some(address) = runtime.ipv4_address(name)? {
            return Ok(address);
        }
        info!(
            container = name,
            attempt,
            max = config.network_wait_attempts,
            "waiting for network address"
        );
        tokio::time::sleep(config.network_wait_interval).await;
    }
    bail!(
        "no network address after {} attempts",
        config.network_wait_attempts
    )
}

/// Write the unit file, reload the supervisor, enable and start the service
fn activate_service(
    runtime: &dyn ContainerRuntime,
    config: &DeployConfig,
    runtime_config: &RuntimeConfig,
) -> Result<()> {
    let name = config.container_name.as_str();
    let unit = ServiceDescriptor::for_app(config, runtime_config);
    write_remote_file(runtime, name, &config.unit_path(), &unit.render())?;
    exec_checked(runtime, name, "systemctl daemon-reload")?;
    exec_checked(
        runtime,
        name,
        &format!("systemctl enable {}", config.service_name),
    )?;
    exec_checked(
        runtime,
        name,
        &format!("systemctl start {}", config.service_name),
    )?;
    Ok(())
}
