//! Step accounting - mandatory vs. best-effort provisioning steps

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::runtime::ContainerRuntime;

/// Recorded result of a single provisioning or update step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Step label as logged
    pub label: &'static str,
    /// Whether the step succeeded
    pub ok: bool,
    /// Whether a failure of this step aborts the routine
    pub mandatory: bool,
}

/// Accumulates [`StepOutcome`]s while driving a sequence of steps.
///
/// A failed mandatory step aborts the routine; a failed best-effort step
/// is logged and recorded but never propagated.
#[derive(Default)]
pub struct StepRunner {
    outcomes: Vec<StepOutcome>,
}

impl StepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mandatory step, propagating its failure
    pub fn must<T>(&mut self, label: &'static str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                info!("{label}: done");
                self.outcomes.push(StepOutcome {
                    label,
                    ok: true,
                    mandatory: true,
                });
                Ok(value)
            }
            Err(e) => {
                self.outcomes.push(StepOutcome {
                    label,
                    ok: false,
                    mandatory: true,
                });
                Err(e).with_context(|| format!("mandatory step `{label}` failed"))
            }
        }
    }

    /// Record a best-effort step, swallowing its failure
    pub fn best_effort(&mut self, label: &'static str, result: Result<()>) {
        match result {
            Ok(()) => {
                info!("{label}: done");
                self.outcomes.push(StepOutcome {
                    label,
                    ok: true,
                    mandatory: false,
                });
            }
            Err(e) => {
                warn!("{label}: failed ({e:#}), continuing");
                self.outcomes.push(StepOutcome {
                    label,
                    ok: false,
                    mandatory: false,
                });
            }
        }
    }

    pub fn into_outcomes(self) -> Vec<StepOutcome> {
        self.outcomes
    }
}

/// Run a command inside the environment, mapping a nonzero exit to an error
pub fn exec_checked(runtime: &dyn ContainerRuntime, name: &str, command: &str) -> Result<()> {
    let output = runtime.exec(name, command)?;
    if !output.success() {
        bail!(
            "command exited with status {}: {}",
            output.code,
            output.stderr.trim()
        );
    }
    Ok(())
}

/// Materialize a file inside the environment through the runtime's exec channel
pub fn write_remote_file(
    runtime: &dyn ContainerRuntime,
    name: &str,
    path: &str,
    content: &str,
) -> Result<()> {
    let output = runtime.exec_with_stdin(name, &format!("cat > {path}"), content)?;
    if !output.success() {
        bail!(
            "writing {path} exited with status {}: {}",
            output.code,
            output.stderr.trim()
        );
    }
    Ok(())
}
