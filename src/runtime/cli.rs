//! Container runtime implementation driving the LXD CLI

use std::io::Write;
use std::process::{Command, Output, Stdio};

use tracing::{debug, trace};

use super::{ContainerRuntime, ExecOutput, RuntimeError};

/// Runtime adapter that shells out to the `lxc` client binary.
pub struct CliRuntime {
    binary: String,
}

impl CliRuntime {
    pub fn new() -> Self {
        Self {
            binary: "lxc".to_string(),
        }
    }

    /// Use a different client binary (e.g. `incus`)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, RuntimeError> {
        trace!("running {} {}", self.binary, args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(RuntimeError::Unreachable)
    }

    /// Run a management command, treating a nonzero exit as a runtime error
    fn run_checked(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: format!("{} {}", self.binary, args.join(" ")),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Result<Output, RuntimeError> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(RuntimeError::Unreachable)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(RuntimeError::Unreachable)?;
        }

        child.wait_with_output().map_err(RuntimeError::Unreachable)
    }

    fn list_names(&self, args: &[&str]) -> Result<Vec<String>, RuntimeError> {
        let stdout = self.run_checked(args)?;
        parse_names(&stdout)
    }
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerRuntime for CliRuntime {
    fn profile_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        let names = self.list_names(&["profile", "list", "--format=json"])?;
        Ok(names.iter().any(|n| n == name))
    }

    fn create_profile(&self, name: &str, template: &str) -> Result<(), RuntimeError> {
        self.run_checked(&["profile", "create", name])?;
        let output = self.run_with_stdin(&["profile", "edit", name], template)?;
        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: format!("{} profile edit {}", self.binary, name),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(profile = name, "profile created");
        Ok(())
    }

    fn container_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        let names = self.list_names(&["list", name, "--format=json"])?;
        Ok(names.iter().any(|n| n == name))
    }

    fn launch(&self, image: &str, name: &str, profile: &str) -> Result<(), RuntimeError> {
        self.run_checked(&["launch", image, name, "--profile", profile])?;
        Ok(())
    }

    fn ipv4_address(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        let stdout = self.run_checked(&["list", name, "--format=json"])?;
        parse_ipv4(&stdout, name)
    }

    fn exec(&self, name: &str, command: &str) -> Result<ExecOutput, RuntimeError> {
        let output = self.run(&["exec", name, "--", "sh", "-lc", command])?;
        Ok(ExecOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn exec_with_stdin(
        &self,
        name: &str,
        command: &str,
        input: &str,
    ) -> Result<ExecOutput, RuntimeError> {
        let output = self.run_with_stdin(&["exec", name, "--", "sh", "-lc", command], input)?;
        Ok(ExecOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn log_tail(&self, name: &str, unit: &str, lines: u32) -> Result<String, RuntimeError> {
        let command = format!("journalctl -u {} -n {} --no-pager", unit, lines);
        let output = self.exec(name, &command)?;
        if !output.success() {
            return Err(RuntimeError::CommandFailed {
                command,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// Extract instance names from `lxc ... list --format=json` output
fn parse_names(json: &str) -> Result<Vec<String>, RuntimeError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|e| RuntimeError::BadOutput(e.to_string()))?;
    Ok(entries
        .iter()
        .filter_map(|entry| entry["name"].as_str().map(str::to_string))
        .collect())
}

/// Extract the first global IPv4 address of `name`'s eth0 from list output
fn parse_ipv4(json: &str, name: &str) -> Result<Option<String>, RuntimeError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|e| RuntimeError::BadOutput(e.to_string()))?;

    let Some(entry) = entries.iter().find(|e| e["name"].as_str() == Some(name)) else {
        return Ok(None);
    };

    let addresses = &entry["state"]["network"]["eth0"]["addresses"];
    let Some(addresses) = addresses.as_array() else {
        return Ok(None);
    };

    Ok(addresses
        .iter()
        .find(|a| a["family"].as_str() == Some("inet"))
        .and_then(|a| a["address"].as_str())
        .map(str::to_string))
}
