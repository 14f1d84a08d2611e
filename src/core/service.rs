//! Service descriptor - the supervised unit handed to the init system

use super::config::{DeployConfig, RuntimeConfig};

/// Declarative description of how the init system starts the application.
///
/// Written fresh on every provisioning run; the init system owns the
/// process state afterwards, envctl only issues start/enable/restart
/// requests against it.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Unit description
    pub description: String,
    /// Unit this service is ordered after (network readiness)
    pub after: String,
    /// Working directory of the service process
    pub working_directory: String,
    /// Environment file loaded before start
    pub environment_file: String,
    /// Start command, host/port already substituted
    pub exec_start: String,
    /// Restart policy
    pub restart: String,
    /// Process termination mode
    pub kill_mode: String,
    /// Install-time enablement target
    pub wanted_by: String,
}

impl ServiceDescriptor {
    /// Descriptor for the deployed application, with the start command's
    /// host/port filled in from the runtime configuration
    pub fn for_app(deploy: &DeployConfig, runtime: &RuntimeConfig) -> Self {
        Self {
            description: "Deep Coder backend".to_string(),
            after: "network-online.target".to_string(),
            working_directory: deploy.app_dir.clone(),
            environment_file: deploy.env_file.clone(),
            exec_start: format!(
                "{}/.venv/bin/python -m uvicorn backend.main:app --host {} --port {}",
                deploy.app_dir, runtime.backend_host, runtime.backend_port
            ),
            restart: "on-failure".to_string(),
            kill_mode: "mixed".to_string(),
            wanted_by: "multi-user.target".to_string(),
        }
    }

    /// Serialize to systemd unit file syntax
    pub fn render(&self) -> String {
        format!(
            "[Unit]\n\
             Description={}\n\
             After={}\n\
             Wants={}\n\
             \n\
             [Service]\n\
             WorkingDirectory={}\n\
             EnvironmentFile={}\n\
             ExecStart={}\n\
             Restart={}\n\
             KillMode={}\n\
             \n\
             [Install]\n\
             WantedBy={}\n",
            self.description,
            self.after,
            self.after,
            self.working_directory,
            self.environment_file,
            self.exec_start,
            self.restart,
            self.kill_mode,
            self.wanted_by,
        )
    }
}
