//! Service supervisor adapter (systemd).
//!
//! Registration installs the unit, reloads the manager and enables the unit
//! for boot. It never starts the service: the application is not configured
//! until the bootstrap stage has run.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::cmdline::CommandSpec;
use crate::core::types::PrivilegeContext;
use crate::io::host::systemd_booted;
use crate::io::process::{find_on_path, run_inherited};

/// A rendered unit ready to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    pub name: String,
    pub path: PathBuf,
    pub contents: String,
}

pub trait ServiceSupervisor {
    /// True when a supervisor is running on this host.
    fn is_available(&self) -> bool;
    fn register(&self, unit: &ServiceUnit, privilege: &PrivilegeContext) -> Result<()>;
}

pub struct Systemd {
    run_dir: PathBuf,
}

impl Systemd {
    pub fn new() -> Self {
        Self::with_run_dir("/run")
    }

    pub fn with_run_dir(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }
}

impl Default for Systemd {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceSupervisor for Systemd {
    fn is_available(&self) -> bool {
        find_on_path("systemctl").is_some() && systemd_booted(&self.run_dir)
    }

    #[instrument(skip_all, fields(unit = %unit.name))]
    fn register(&self, unit: &ServiceUnit, privilege: &PrivilegeContext) -> Result<()> {
        let mut staged = tempfile::NamedTempFile::new().context("create staging file")?;
        staged
            .write_all(unit.contents.as_bytes())
            .context("write staged unit")?;
        staged.flush().context("flush staged unit")?;

        for spec in registration_commands(unit, staged.path()) {
            let spec = privilege.elevate(spec)?;
            debug!(command = %spec, "systemd step");
            run_inherited(&spec)?;
        }
        info!(path = %unit.path.display(), "service registered and enabled");
        Ok(())
    }
}

/// Install, reload, enable. Start is deliberately absent.
pub fn registration_commands(unit: &ServiceUnit, staged: &Path) -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("install")
            .args(["-m", "0644"])
            .arg(staged.display().to_string())
            .arg(unit.path.display().to_string()),
        CommandSpec::new("systemctl").arg("daemon-reload"),
        CommandSpec::new("systemctl")
            .arg("enable")
            .arg(format!("{}.service", unit.name)),
    ]
}
