//! Deployment configuration - fixed constants and the service environment file

use std::path::PathBuf;
use std::time::Duration;

/// Default environment/container name
pub const DEFAULT_CONTAINER: &str = "deep-coder";

/// Default health endpoint probed by `envctl check`
pub const DEFAULT_HEALTH_URL: &str = "http://127.0.0.1:8000/health";

/// Default journal tail captured on a degraded health check
pub const DEFAULT_TAIL_LINES: u32 = 200;

/// Everything the provisioning and supervision routines need to know,
/// passed explicitly so tests can inject values without touching the
/// process environment.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    // Environment
    /// Target container name
    pub container_name: String,
    /// Base image the container is launched from
    pub image: String,
    /// Resource profile applied at launch
    pub profile_name: String,

    // Application
    /// Remote repository the application is fetched from
    pub repo_url: String,
    /// Checkout path inside the container
    pub app_dir: String,
    /// systemd unit name of the supervised service
    pub service_name: String,
    /// Environment file consumed by the service
    pub env_file: String,
    /// Backend port opened in the container firewall
    pub backend_port: u16,

    // Bounds
    /// Network readiness poll attempts
    pub network_wait_attempts: u32,
    /// Delay between readiness polls
    pub network_wait_interval: Duration,
    /// Health endpoint request timeout
    pub health_timeout: Duration,

    // Diagnostics
    /// Where the health monitor writes the captured journal tail
    pub capture_path: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            container_name: DEFAULT_CONTAINER.to_string(),
            image: "ubuntu:22.04".to_string(),
            profile_name: "deep-coder".to_string(),
            repo_url: "https://github.com/open-deep-coder/deep-coder.git".to_string(),
            app_dir: "/opt/deep-coder".to_string(),
            service_name: "deep-coder".to_string(),
            env_file: "/etc/deep-coder.env".to_string(),
            backend_port: 8000,
            network_wait_attempts: 30,
            network_wait_interval: Duration::from_secs(1),
            health_timeout: Duration::from_secs(5),
            capture_path: PathBuf::from("/var/log/envctl/deep-coder-health.log"),
        }
    }
}

impl DeployConfig {
    /// Config targeting a differently named container
    pub fn for_container(name: impl Into<String>) -> Self {
        Self {
            container_name: name.into(),
            ..Default::default()
        }
    }

    /// Path of the systemd unit file inside the container
    pub fn unit_path(&self) -> String {
        format!("/etc/systemd/system/{}.service", self.service_name)
    }
}

/// The service's runtime configuration, materialized as a flat
/// key=value file inside the container.
///
/// The key schema is fixed; secret values default to empty and are
/// supplied out-of-band by an operator.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upstream LLM API key (secret)
    pub openrouter_api_key: String,
    /// Local model server base URL
    pub ollama_base_url: String,
    /// Backend bind host
    pub backend_host: String,
    /// Backend bind port
    pub backend_port: u16,
    /// Frontend bind host
    pub frontend_host: String,
    /// Frontend bind port
    pub frontend_port: u16,
    /// Development mode flag
    pub dev_mode: bool,
    /// Service log verbosity
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: String::new(),
            ollama_base_url: "http://localhost:11434".to_string(),
            backend_host: "127.0.0.1".to_string(),
            backend_port: 8000,
            frontend_host: "127.0.0.1".to_string(),
            frontend_port: 1420,
            dev_mode: false,
            log_level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Render as key=value lines for the environment file
    pub fn render(&self) -> String {
        format!(
            "OPENROUTER_API_KEY={}\n\
             OLLAMA_BASE_URL={}\n\
             BACKEND_HOST={}\n\
             BACKEND_PORT={}\n\
             FRONTEND_HOST={}\n\
             FRONTEND_PORT={}\n\
             DEV_MODE={}\n\
             LOG_LEVEL={}\n",
            self.openrouter_api_key,
            self.ollama_base_url,
            self.backend_host,
            self.backend_port,
            self.frontend_host,
            self.frontend_port,
            self.dev_mode,
            self.log_level,
        )
    }
}
