//! Health monitor - single-pass liveness check with best-effort recovery

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::runtime::ContainerRuntime;

use super::config::DeployConfig;
use super::step::exec_checked;

/// Contract value a healthy service reports in its `status` field
const HEALTHY_STATUS: &str = "healthy";

/// Classification of a single health check pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Endpoint reachable and reporting healthy
    Healthy,
    /// Endpoint reachable but unhealthy or unparseable
    Degraded,
    /// Endpoint not reachable within the timeout
    Unreachable,
}

impl HealthVerdict {
    /// Distinct process exit code for each classification
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Unreachable => 1,
            Self::Degraded => 2,
        }
    }
}

/// Health endpoint response body. Extra fields (version, per-service
/// readiness) are tolerated and ignored.
#[derive(Debug, Deserialize)]
pub struct HealthReport {
    pub status: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HEALTHY_STATUS
    }
}

/// Probe the service's health endpoint once and attempt recovery on
/// failure.
///
/// Never escalates: every failure path ends in logging, a best-effort
/// restart, and a distinguishing verdict. Detecting a *persistent*
/// unhealthy condition across scheduled invocations is the caller's
/// responsibility.
pub async fn check(
    runtime: &dyn ContainerRuntime,
    config: &DeployConfig,
    endpoint: &str,
    tail_lines: u32,
) -> HealthVerdict {
    info!(endpoint, "checking service health");

    let client = reqwest::Client::new();
    let response = client
        .get(endpoint)
        .timeout(config.health_timeout)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            warn!(endpoint, error = %e, "health endpoint unreachable");
            restart_service(runtime, config);
            return HealthVerdict::Unreachable;
        }
    };

    match response.json::<HealthReport>().await {
        Ok(report) if report.is_healthy() => {
            info!(endpoint, "service healthy");
            HealthVerdict::Healthy
        }
        Ok(report) => {
            warn!(endpoint, status = %report.status, "service degraded");
            restart_service(runtime, config);
            capture_journal(runtime, config, tail_lines);
            HealthVerdict::Degraded
        }
        Err(e) => {
            warn!(endpoint, error = %e, "health response unparseable");
            restart_service(runtime, config);
            capture_journal(runtime, config, tail_lines);
            HealthVerdict::Degraded
        }
    }
}

/// Request a service restart inside the environment; failure is logged,
/// never propagated
fn restart_service(runtime: &dyn ContainerRuntime, config: &DeployConfig) {
    let command = format!("systemctl restart {}", config.service_name);
    match exec_checked(runtime, &config.container_name, &command) {
        Ok(()) => info!(service = %config.service_name, "restart requested"),
        Err(e) => warn!(service = %config.service_name, "restart attempt failed: {e:#}"),
    }
}

/// Capture a bounded tail of the service journal for operator review
fn capture_journal(runtime: &dyn ContainerRuntime, config: &DeployConfig, tail_lines: u32) {
    let tail = match runtime.log_tail(&config.container_name, &config.service_name, tail_lines) {
        Ok(tail) => tail,
        Err(e) => {
            warn!("journal capture failed: {e}");
            return;
        }
    };

    if let Err(e) = write_capture(&config.capture_path, &tail) {
        warn!(path = %config.capture_path.display(), "writing journal capture failed: {e}");
    } else {
        info!(path = %config.capture_path.display(), "journal tail captured");
    }
}

fn write_capture(path: &Path, tail: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::FakeRuntime;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(dir: &tempfile::TempDir) -> DeployConfig {
        DeployConfig {
            capture_path: dir.path().join("health.log"),
            ..Default::default()
        }
    }

    async fn serve(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn healthy_service_is_left_alone() {
        let server = serve(json!({"status": "healthy", "version": "0.1.0"})).await;
        let runtime = FakeRuntime::new().with_container("deep-coder");
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let verdict = check(&runtime, &config, &format!("{}/health", server.uri()), 200).await;

        assert_eq!(verdict, HealthVerdict::Healthy);
        assert_eq!(verdict.exit_code(), 0);
        assert_eq!(runtime.count_calls("systemctl restart"), 0);
        assert_eq!(runtime.count_calls("log-tail"), 0);
        assert!(!config.capture_path.exists());
    }

    #[tokio::test]
    async fn unhealthy_status_restarts_and_captures() {
        let server = serve(json!({"status": "unhealthy"})).await;
        let journal: Vec<String> = (0..300).map(|i| format!("journal line {i}")).collect();
        let runtime = FakeRuntime::new()
            .with_container("deep-coder")
            .with_journal(&journal.join("\n"));
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let verdict = check(&runtime, &config, &format!("{}/health", server.uri()), 200).await;

        assert_eq!(verdict, HealthVerdict::Degraded);
        assert_eq!(verdict.exit_code(), 2);
        assert_eq!(runtime.count_calls("systemctl restart deep-coder"), 1);

        let captured = std::fs::read_to_string(&config.capture_path).unwrap();
        assert!(captured.lines().count() <= 200);
        assert!(captured.contains("journal line 299"));
    }

    #[tokio::test]
    async fn unparseable_body_is_degraded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        let runtime = FakeRuntime::new().with_container("deep-coder");
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let verdict = check(&runtime, &config, &format!("{}/health", server.uri()), 50).await;

        assert_eq!(verdict, HealthVerdict::Degraded);
        assert_eq!(runtime.count_calls("systemctl restart"), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_restarts_without_capture() {
        let runtime = FakeRuntime::new().with_container("deep-coder");
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        // Nothing listens on port 1.
        let verdict = check(&runtime, &config, "http://127.0.0.1:1/health", 200).await;

        assert_eq!(verdict, HealthVerdict::Unreachable);
        assert_eq!(verdict.exit_code(), 1);
        assert_eq!(runtime.count_calls("systemctl restart deep-coder"), 1);
        assert_eq!(runtime.count_calls("log-tail"), 0);
        assert!(!config.capture_path.exists());
    }

    #[test]
    fn report_contract_matches_literal_healthy() {
        let report: HealthReport =
            serde_json::from_str(r#"{"status": "healthy", "services": {}}"#).unwrap();
        assert!(report.is_healthy());

        let report: HealthReport = serde_json::from_str(r#"{"status": "HEALTHY"}"#).unwrap();
        assert!(!report.is_healthy());

        assert!(serde_json::from_str::<HealthReport>(r#"{"version": "0.1.0"}"#).is_err());
    }
}
