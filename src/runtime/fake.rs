//! Scripted in-memory runtime used by the state-machine tests

use std::collections::HashSet;
use std::sync::Mutex;

use super::{ContainerRuntime, ExecOutput, RuntimeError};

/// In-memory [`ContainerRuntime`] that records every call and can be
/// scripted to fail selected commands or withhold a network address.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    profiles: HashSet<String>,
    containers: HashSet<String>,
    /// Number of address polls that return nothing before one succeeds
    address_after_polls: u32,
    polls_seen: u32,
    /// Exec commands containing any of these substrings exit nonzero
    failing_commands: Vec<String>,
    journal: String,
    calls: Vec<String>,
    written_files: Vec<(String, String)>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, name: &str) -> Self {
        self.state.lock().unwrap().containers.insert(name.to_string());
        self
    }

    pub fn with_profile(self, name: &str) -> Self {
        self.state.lock().unwrap().profiles.insert(name.to_string());
        self
    }

    /// Withhold the network address for the first `polls` attempts
    pub fn address_after(self, polls: u32) -> Self {
        self.state.lock().unwrap().address_after_polls = polls;
        self
    }

    /// Never assign a network address
    pub fn hold_address(self) -> Self {
        self.address_after(u32::MAX)
    }

    /// Make any exec whose command contains `needle` exit nonzero
    pub fn fail_command(self, needle: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_commands
            .push(needle.to_string());
        self
    }

    pub fn with_journal(self, text: &str) -> Self {
        self.state.lock().unwrap().journal = text.to_string();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls containing `needle`
    pub fn count_calls(&self, needle: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }

    pub fn network_polls(&self) -> u32 {
        self.state.lock().unwrap().polls_seen
    }

    /// Content of the first file written through a command containing `needle`
    pub fn written(&self, needle: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .written_files
            .iter()
            .find(|(command, _)| command.contains(needle))
            .map(|(_, content)| content.clone())
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn exec_code(&self, command: &str) -> i32 {
        let failing = self
            .state
            .lock()
            .unwrap()
            .failing_commands
            .iter()
            .any(|needle| command.contains(needle));
        if failing {
            1
        } else {
            0
        }
    }
}

impl ContainerRuntime for FakeRuntime {
    fn profile_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        self.record(format!("profile-exists {name}"));
        Ok(self.state.lock().unwrap().profiles.contains(name))
    }

    fn create_profile(&self, name: &str, _template: &str) -> Result<(), RuntimeError> {
        self.record(format!("profile-create {name}"));
        self.state.lock().unwrap().profiles.insert(name.to_string());
        Ok(())
    }

    fn container_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        self.record(format!("container-exists {name}"));
        Ok(self.state.lock().unwrap().containers.contains(name))
    }

    fn launch(&self, image: &str, name: &str, profile: &str) -> Result<(), RuntimeError> {
        self.record(format!("launch {image} {name} {profile}"));
        self.state.lock().unwrap().containers.insert(name.to_string());
        Ok(())
    }

    fn ipv4_address(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        self.record(format!("address {name}"));
        let mut state = self.state.lock().unwrap();
        state.polls_seen += 1;
        if state.polls_seen > state.address_after_polls {
            Ok(Some("10.150.77.12".to_string()))
        } else {
            Ok(None)
        }
    }

    fn exec(&self, name: &str, command: &str) -> Result<ExecOutput, RuntimeError> {
        self.record(format!("exec {name}: {command}"));
        let code = self.exec_code(command);
        Ok(ExecOutput {
            code,
            stdout: String::new(),
            stderr: if code == 0 {
                String::new()
            } else {
                "scripted failure".to_string()
            },
        })
    }

    fn exec_with_stdin(
        &self,
        name: &str,
        command: &str,
        input: &str,
    ) -> Result<ExecOutput, RuntimeError> {
        self.record(format!("write {name}: {command}"));
        let code = self.exec_code(command);
        if code == 0 {
            self.state
                .lock()
                .unwrap()
                .written_files
                .push((command.to_string(), input.to_string()));
        }
        Ok(ExecOutput {
            code,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn log_tail(&self, name: &str, unit: &str, lines: u32) -> Result<String, RuntimeError> {
        self.record(format!("log-tail {name} {unit} {lines}"));
        let journal = self.state.lock().unwrap().journal.clone();
        let tail: Vec<&str> = journal
            .lines()
            .rev()
            .take(lines as usize)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Ok(tail.join("\n"))
    }
}
