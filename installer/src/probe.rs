//! Environment Prober: host identity, privilege, and dependency health.
//!
//! A dependency is healthy only when it is present *and* a functional check
//! passes. The venv check builds a real throwaway environment in a temporary
//! directory that is removed on drop, whatever the outcome.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::cmdline::CommandSpec;
use crate::core::fatal::{Fatal, FatalKind};
use crate::core::os_release::{identity_from_kernel, identity_from_os_release};
use crate::core::types::{
    Dependency, DependencyHealth, DependencyStatus, HostContext, HostIdentity, InvokingUser,
    PrivilegeContext,
};
use crate::core::version::{meets_minimum, parse_version};
use crate::io::config::RuntimeConfig;
use crate::io::host::HostInspector;

const ELEVATION_TOOL: &str = "sudo";
const PYTHON_VERSION_SNIPPET: &str = "import sys; print('%d.%d.%d' % sys.version_info[:3])";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub host: HostContext,
    pub dependencies: Vec<DependencyStatus>,
}

impl ProbeReport {
    pub fn unhealthy(&self) -> Vec<Dependency> {
        self.dependencies
            .iter()
            .filter(|status| !status.health.is_healthy())
            .map(|status| status.dependency)
            .collect()
    }
}

/// Probe the host. Only an unidentifiable host is an error.
#[instrument(skip_all)]
pub fn probe_host(host: &dyn HostInspector, runtime: &RuntimeConfig) -> Result<ProbeReport> {
    let identity = identify(host)?;
    let user = host.invoking_user().map_err(|err| {
        Fatal::new(
            FatalKind::Environment,
            "invoking user",
            format!("cannot determine the invoking user: {err:#}"),
        )
    })?;
    let privilege = privilege_context(host, &user);
    debug!(
        family = %identity.family,
        superuser = privilege.superuser,
        elevation = ?privilege.elevation,
        "host identified"
    );

    let dependencies = Dependency::ALL
        .iter()
        .map(|&dependency| DependencyStatus {
            dependency,
            health: check_dependency(host, dependency, runtime),
        })
        .collect();

    Ok(ProbeReport {
        host: HostContext {
            identity,
            privilege,
            user,
        },
        dependencies,
    })
}

/// Read the host identity from os-release, falling back to the kernel name.
pub fn identify(host: &dyn HostInspector) -> Result<HostIdentity> {
    let resolve = || -> Result<HostIdentity> {
        let arch = host.architecture().context("read architecture")?;
        match host.os_release()? {
            Some(raw) => Ok(identity_from_os_release(&raw, &arch)),
            None => identity_from_kernel(&host.kernel_name()?, &arch),
        }
    };
    resolve().map_err(|err| {
        warn!(err = %err, "host identity unknown");
        anyhow::Error::new(
            Fatal::new(
                FatalKind::Environment,
                "host identity",
                format!("cannot determine the operating system: {err:#}"),
            )
            .with_remedy("run the installer on a Linux distribution with /etc/os-release, or on macOS"),
        )
    })
}

pub fn privilege_context(host: &dyn HostInspector, user: &InvokingUser) -> PrivilegeContext {
    if user.uid == 0 {
        return PrivilegeContext::superuser();
    }
    match host.find_executable(ELEVATION_TOOL) {
        Some(_) => PrivilegeContext::with_elevation(ELEVATION_TOOL),
        None => PrivilegeContext::unprivileged(),
    }
}

/// Presence check followed by a functional check.
#[instrument(skip_all, fields(dependency = %dependency))]
pub fn check_dependency(
    host: &dyn HostInspector,
    dependency: Dependency,
    runtime: &RuntimeConfig,
) -> DependencyHealth {
    let program = match dependency {
        Dependency::SourceControl => "git",
        Dependency::Runtime | Dependency::IsolatedEnv => runtime.interpreter.as_str(),
        Dependency::NativeToolchain => "cc",
    };
    if host.find_executable(program).is_none() {
        debug!(program, "not on PATH");
        return DependencyHealth::Absent;
    }

    let health = match dependency {
        Dependency::SourceControl => simple_check(host, CommandSpec::new("git").arg("--version")),
        Dependency::NativeToolchain => simple_check(host, CommandSpec::new("cc").arg("--version")),
        Dependency::Runtime => check_runtime_version(host, runtime),
        Dependency::IsolatedEnv => check_isolated_env(host, &runtime.interpreter),
    };
    debug!(health = %health.summary(), "checked");
    health
}

fn simple_check(host: &dyn HostInspector, spec: CommandSpec) -> DependencyHealth {
    match host.run_check(&spec) {
        Ok(result) if result.success => DependencyHealth::Healthy {
            detail: first_line(&result.stdout),
        },
        Ok(result) => DependencyHealth::Broken {
            reason: failure_reason(&spec, &result.stderr),
        },
        Err(err) => DependencyHealth::Broken {
            reason: format!("{err:#}"),
        },
    }
}

fn check_runtime_version(host: &dyn HostInspector, runtime: &RuntimeConfig) -> DependencyHealth {
    let spec = CommandSpec::new(&runtime.interpreter).args(["-c", PYTHON_VERSION_SNIPPET]);
    let found = match host.run_check(&spec) {
        Ok(result) if result.success => result.stdout,
        Ok(result) => {
            return DependencyHealth::Broken {
                reason: failure_reason(&spec, &result.stderr),
            };
        }
        Err(err) => {
            return DependencyHealth::Broken {
                reason: format!("{err:#}"),
            };
        }
    };
    let (found, minimum) = match (
        parse_version(&found),
        parse_version(&runtime.min_version),
    ) {
        (Ok(found), Ok(minimum)) => (found, minimum),
        (Err(err), _) | (_, Err(err)) => {
            return DependencyHealth::Broken {
                reason: format!("{err:#}"),
            };
        }
    };
    if !meets_minimum(&found, &minimum) {
        return DependencyHealth::Broken {
            reason: format!("{} {found} is older than required {minimum}", runtime.interpreter),
        };
    }
    DependencyHealth::Healthy {
        detail: format!("{} {found}", runtime.interpreter),
    }
}

fn check_isolated_env(host: &dyn HostInspector, interpreter: &str) -> DependencyHealth {
    let scratch = match tempfile::Builder::new()
        .prefix("installer-venv-probe")
        .tempdir()
    {
        Ok(dir) => dir,
        Err(err) => {
            return DependencyHealth::Broken {
                reason: format!("cannot create scratch directory: {err}"),
            };
        }
    };
    let env_dir = scratch.path().join("env");
    let spec = CommandSpec::new(interpreter)
        .args(["-m", "venv"])
        .arg(env_dir.display().to_string());
    match simple_check(host, spec) {
        DependencyHealth::Healthy { .. } => DependencyHealth::Healthy {
            detail: "throwaway environment created".to_string(),
        },
        other => other,
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}

fn failure_reason(spec: &CommandSpec, stderr: &str) -> String {
    let line = first_line(stderr);
    if line.is_empty() {
        format!("`{spec}` failed")
    } else {
        format!("`{spec}` failed: {line}")
    }
}
