//! Resource profiles - the shared policy bundle applied at launch

use anyhow::{Context, Result};
use tracing::info;

use crate::runtime::ContainerRuntime;

/// Result of an [`ensure_profile`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    /// A profile with this name already existed; its definition is not
    /// reconciled against the template
    AlreadyPresent,
    /// The profile was created from the standard template
    Created,
}

/// A named CPU/memory/network/storage policy bundle.
#[derive(Debug, Clone)]
pub struct ResourceProfile {
    /// Profile name
    pub name: String,
    /// CPU ceiling (cores)
    pub cpu_limit: u32,
    /// Memory ceiling
    pub memory_limit: String,
    /// Host bridge the container NIC attaches to
    pub bridge: String,
    /// Storage pool backing the root disk
    pub storage_pool: String,
}

impl ResourceProfile {
    /// The standard profile used for every deployment environment
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu_limit: 2,
            memory_limit: "4GiB".to_string(),
            bridge: "lxdbr0".to_string(),
            storage_pool: "default".to_string(),
        }
    }

    /// Render the declarative template consumed by the runtime
    pub fn render_template(&self) -> String {
        let mut template = String::new();
        template.push_str("config:\n");
        template.push_str(&format!("  limits.cpu: \"{}\"\n", self.cpu_limit));
        template.push_str(&format!("  limits.memory: {}\n", self.memory_limit));
        template.push_str("description: Deep Coder deployment profile\n");
        template.push_str("devices:\n");
        template.push_str("  eth0:\n");
        template.push_str("    name: eth0\n");
        template.push_str("    nictype: bridged\n");
        template.push_str(&format!("    parent: {}\n", self.bridge));
        template.push_str("    type: nic\n");
        template.push_str("  root:\n");
        template.push_str("    path: /\n");
        template.push_str(&format!("    pool: {}\n", self.storage_pool));
        template.push_str("    type: disk\n");
        template
    }
}

/// Guarantee the profile exists before any environment is created.
///
/// Idempotent: a pre-existing profile with the same name satisfies the
/// requirement without modification, even if its definition has diverged
/// from the template. Creation failure is fatal to the caller.
pub fn ensure_profile(
    runtime: &dyn ContainerRuntime,
    profile: &ResourceProfile,
) -> Result<ProfileState> {
    let present = runtime
        .profile_exists(&profile.name)
        .context("failed to query resource profile")?;

    if present {
        info!(profile = %profile.name, "resource profile already present");
        return Ok(ProfileState::AlreadyPresent);
    }

    runtime
        .create_profile(&profile.name, &profile.render_template())
        .context("failed to create resource profile")?;
    info!(profile = %profile.name, "resource profile created");
    Ok(ProfileState::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::FakeRuntime;

    #[test]
    fn creates_missing_profile() {
        let runtime = FakeRuntime::new();
        let profile = ResourceProfile::standard("deep-coder");

        let state = ensure_profile(&runtime, &profile).unwrap();

        assert_eq!(state, ProfileState::Created);
        assert_eq!(runtime.count_calls("profile-create deep-coder"), 1);
    }

    #[test]
    fn existing_profile_is_left_alone() {
        let runtime = FakeRuntime::new().with_profile("deep-coder");
        let profile = ResourceProfile::standard("deep-coder");

        let state = ensure_profile(&runtime, &profile).unwrap();

        assert_eq!(state, ProfileState::AlreadyPresent);
        assert_eq!(runtime.count_calls("profile-create"), 0);
    }

    #[test]
    fn template_carries_limits_and_devices() {
        let template = ResourceProfile::standard("deep-coder").render_template();
        assert!(template.contains("limits.cpu: \"2\""));
        assert!(template.contains("limits.memory: 4GiB"));
        assert!(template.contains("nictype: bridged"));
        assert!(template.contains("parent: lxdbr0"));
        assert!(template.contains("pool: default"));
    }
}
