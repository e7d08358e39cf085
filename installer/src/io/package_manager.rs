//! System package manager adapter used by the remediator.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::cmdline::CommandSpec;
use crate::core::remediation::PackageManagerKind;
use crate::core::types::PrivilegeContext;
use crate::io::process::run_inherited;

/// One batched install: every missing package, one manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub manager: PackageManagerKind,
    pub privilege: PrivilegeContext,
    pub packages: Vec<String>,
}

pub trait PackageManager {
    /// Refresh the package index (where the manager needs it) and install `packages`.
    fn ensure(&self, request: &InstallRequest) -> Result<()>;
}

/// Drives the host's package manager with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPackageManager;

impl PackageManager for SystemPackageManager {
    #[instrument(skip_all, fields(manager = request.manager.program(), count = request.packages.len()))]
    fn ensure(&self, request: &InstallRequest) -> Result<()> {
        if request.packages.is_empty() {
            return Ok(());
        }
        let privileged = |spec: CommandSpec| -> Result<CommandSpec> {
            if request.manager.requires_elevation() {
                request.privilege.elevate(spec)
            } else {
                Ok(spec)
            }
        };

        if let Some(refresh) = request.manager.refresh_command() {
            let refresh = privileged(refresh)?;
            run_inherited(&refresh).context("refresh package index")?;
        }
        let install = privileged(request.manager.install_command(&request.packages))?;
        info!(command = %install, "installing packages");
        run_inherited(&install).context("install packages")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_runs_nothing() {
        // No elevation tool and no packages: nothing to spawn, nothing to fail.
        let request = InstallRequest {
            manager: PackageManagerKind::Apt,
            privilege: PrivilegeContext::unprivileged(),
            packages: Vec::new(),
        };
        SystemPackageManager.ensure(&request).expect("noop");
    }

    #[test]
    fn elevation_failure_stops_before_spawning() {
        let request = InstallRequest {
            manager: PackageManagerKind::Dnf,
            privilege: PrivilegeContext::unprivileged(),
            packages: vec!["git".to_string()],
        };
        let err = SystemPackageManager.ensure(&request).expect_err("no sudo");
        assert!(err.to_string().contains("no elevation tool"), "{err}");
    }
}
