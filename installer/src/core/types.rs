//! Host facts shared by every installer stage.
//!
//! The prober fills these in once per run. Later stages only read them, which
//! keeps the whole procedure free of ambient globals: everything a stage needs
//! about the host travels in a [`HostContext`].

use std::fmt;

use anyhow::{Result, anyhow};
use serde::Serialize;

use super::cmdline::CommandSpec;

/// OS family, resolved from `/etc/os-release` (or `uname -s` on macOS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OsFamily {
    Debian,
    Fedora,
    Arch,
    Alpine,
    Suse,
    MacOs,
    /// Identified host whose package manager we do not know how to drive.
    Unknown(String),
}

impl OsFamily {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Debian => "debian",
            Self::Fedora => "fedora",
            Self::Arch => "arch",
            Self::Alpine => "alpine",
            Self::Suse => "suse",
            Self::MacOs => "macos",
            Self::Unknown(id) => id.as_str(),
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable identity of the host, read once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostIdentity {
    pub family: OsFamily,
    /// Distribution id as reported by the host (`ubuntu`, `fedora`, `darwin`, ...).
    pub id: String,
    pub version: Option<String>,
    pub pretty_name: Option<String>,
    pub arch: String,
}

/// Whether privileged operations can run, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivilegeContext {
    pub superuser: bool,
    /// Elevation tool to prefix privileged commands with (`sudo`), if any.
    pub elevation: Option<String>,
}

impl PrivilegeContext {
    pub fn superuser() -> Self {
        Self {
            superuser: true,
            elevation: None,
        }
    }

    pub fn with_elevation(tool: impl Into<String>) -> Self {
        Self {
            superuser: false,
            elevation: Some(tool.into()),
        }
    }

    pub fn unprivileged() -> Self {
        Self {
            superuser: false,
            elevation: None,
        }
    }

    pub fn can_elevate(&self) -> bool {
        self.superuser || self.elevation.is_some()
    }

    /// Wrap `spec` so it runs with elevated privilege.
    ///
    /// Superusers run commands as-is. Errors when elevation is unavailable.
    pub fn elevate(&self, spec: CommandSpec) -> Result<CommandSpec> {
        if self.superuser {
            return Ok(spec);
        }
        match &self.elevation {
            Some(tool) => Ok(spec.prefixed(tool)),
            None => Err(anyhow!(
                "`{}` needs superuser privilege but no elevation tool (sudo) is available",
                spec.program
            )),
        }
    }
}

/// The user running the installer; becomes the service's run identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvokingUser {
    pub name: String,
    pub group: String,
    pub uid: u32,
}

/// Required external capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dependency {
    /// `git`, used to acquire and update the working copy.
    SourceControl,
    /// The language runtime at or above the configured minimum version.
    Runtime,
    /// A runtime that can actually build an isolated environment.
    IsolatedEnv,
    /// A C toolchain for native extension builds.
    NativeToolchain,
}

impl Dependency {
    pub const ALL: [Dependency; 4] = [
        Dependency::SourceControl,
        Dependency::Runtime,
        Dependency::IsolatedEnv,
        Dependency::NativeToolchain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceControl => "source-control",
            Self::Runtime => "runtime",
            Self::IsolatedEnv => "isolated-env",
            Self::NativeToolchain => "native-toolchain",
        }
    }

    /// Human label naming the capability in diagnostics.
    pub fn capability(self) -> &'static str {
        match self {
            Self::SourceControl => "git client",
            Self::Runtime => "Python runtime",
            Self::IsolatedEnv => "Python venv support",
            Self::NativeToolchain => "C toolchain",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum DependencyHealth {
    Absent,
    Broken { reason: String },
    Healthy { detail: String },
}

impl DependencyHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Absent => "absent".to_string(),
            Self::Broken { reason } => format!("broken ({reason})"),
            Self::Healthy { detail } => format!("healthy ({detail})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub dependency: Dependency,
    pub health: DependencyHealth,
}

/// Everything later stages need to know about the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostContext {
    pub identity: HostIdentity,
    pub privilege: PrivilegeContext,
    pub user: InvokingUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_runs_commands_unwrapped() {
        let spec = CommandSpec::new("systemctl").arg("daemon-reload");
        let elevated = PrivilegeContext::superuser()
            .elevate(spec.clone())
            .expect("elevate");
        assert_eq!(elevated, spec);
    }

    #[test]
    fn sudo_prefixes_privileged_commands() {
        let elevated = PrivilegeContext::with_elevation("sudo")
            .elevate(CommandSpec::new("systemctl").arg("daemon-reload"))
            .expect("elevate");
        assert_eq!(elevated.program, "sudo");
        assert_eq!(elevated.args, vec!["systemctl", "daemon-reload"]);
    }

    #[test]
    fn elevation_fails_without_tool() {
        let err = PrivilegeContext::unprivileged()
            .elevate(CommandSpec::new("apt-get"))
            .expect_err("no elevation");
        assert!(err.to_string().contains("no elevation tool"));
    }

    #[test]
    fn health_summary_names_state() {
        let health = DependencyHealth::Broken {
            reason: "venv failed".to_string(),
        };
        assert_eq!(health.summary(), "broken (venv failed)");
        assert!(!health.is_healthy());
    }
}
