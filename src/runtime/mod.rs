//! Container runtime abstraction - the seam between envctl and the LXD CLI

mod cli;

#[cfg(test)]
pub mod fake;

pub use cli::CliRuntime;

/// Errors surfaced by the container runtime adapter.
///
/// An unreachable runtime is kept distinct from a command that ran and
/// failed: the prober must never read "daemon down" as "does not exist".
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container runtime unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    #[error("`{command}` exited with status {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("unexpected runtime output: {0}")]
    BadOutput(String),
}

/// Captured result of a command executed inside an environment.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Process exit code (-1 if terminated by signal)
    pub code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Operations envctl needs from the container runtime.
///
/// Management operations (profile/launch) report failure as an error;
/// `exec` captures the in-container exit status and leaves interpretation
/// to the caller.
pub trait ContainerRuntime: Send + Sync {
    /// Check whether a resource profile with this name exists
    fn profile_exists(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Create a profile and apply the given declarative template to it
    fn create_profile(&self, name: &str, template: &str) -> Result<(), RuntimeError>;

    /// Check whether an environment with this name exists
    fn container_exists(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Launch a new environment from an image under the given profile
    fn launch(&self, image: &str, name: &str, profile: &str) -> Result<(), RuntimeError>;

    /// Current IPv4 address of the environment's primary interface, if assigned
    fn ipv4_address(&self, name: &str) -> Result<Option<String>, RuntimeError>;

    /// Run a shell command inside the environment, capturing its exit status
    fn exec(&self, name: &str, command: &str) -> Result<ExecOutput, RuntimeError>;

    /// Run a shell command inside the environment with the given stdin
    fn exec_with_stdin(
        &self,
        name: &str,
        command: &str,
        input: &str,
    ) -> Result<ExecOutput, RuntimeError>;

    /// Retrieve the last `lines` lines of a service's journal inside the environment
    fn log_tail(&self, name: &str, unit: &str, lines: u32) -> Result<String, RuntimeError>;
}
