//! Host inspection adapter used by the prober.
//!
//! The [`HostInspector`] trait is the only way the prober touches the host, so
//! tests can describe a machine (distribution, tools, broken venv support)
//! without spawning anything.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::cmdline::CommandSpec;
use crate::core::types::InvokingUser;
use crate::io::process::{find_on_path, run_captured};

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];
const CHECK_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

/// Result of a functional check command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CheckResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

pub trait HostInspector {
    /// Raw os-release contents, or `None` when the host has no such file.
    fn os_release(&self) -> Result<Option<String>>;
    /// Kernel name as printed by `uname -s`.
    fn kernel_name(&self) -> Result<String>;
    /// Machine architecture as printed by `uname -m`.
    fn architecture(&self) -> Result<String>;
    fn invoking_user(&self) -> Result<InvokingUser>;
    fn find_executable(&self, name: &str) -> Option<PathBuf>;
    /// Run a short functional check and report how it went.
    fn run_check(&self, check: &CommandSpec) -> Result<CheckResult>;
}

/// Inspector for the machine the installer runs on.
pub struct SystemHost {
    check_timeout: Duration,
}

impl SystemHost {
    pub fn new(check_timeout: Duration) -> Self {
        Self { check_timeout }
    }

    fn query(&self, spec: &CommandSpec) -> Result<String> {
        let result = self.run_check(spec)?;
        if !result.success {
            return Err(anyhow!("`{spec}` failed: {}", result.stderr));
        }
        Ok(result.stdout)
    }
}

impl HostInspector for SystemHost {
    fn os_release(&self) -> Result<Option<String>> {
        for path in OS_RELEASE_PATHS {
            match fs::read_to_string(path) {
                Ok(raw) => {
                    debug!(path, "read os-release");
                    return Ok(Some(raw));
                }
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err).with_context(|| format!("read {path}")),
            }
        }
        Ok(None)
    }

    fn kernel_name(&self) -> Result<String> {
        self.query(&CommandSpec::new("uname").arg("-s"))
    }

    fn architecture(&self) -> Result<String> {
        self.query(&CommandSpec::new("uname").arg("-m"))
    }

    #[instrument(skip_all)]
    fn invoking_user(&self) -> Result<InvokingUser> {
        let name = self.query(&CommandSpec::new("id").arg("-un"))?;
        let group = self.query(&CommandSpec::new("id").arg("-gn"))?;
        let uid_raw = self.query(&CommandSpec::new("id").arg("-u"))?;
        let uid = uid_raw
            .parse::<u32>()
            .with_context(|| format!("parse uid '{uid_raw}'"))?;
        debug!(%name, %group, uid, "invoking user");
        Ok(InvokingUser { name, group, uid })
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        find_on_path(name)
    }

    fn run_check(&self, check: &CommandSpec) -> Result<CheckResult> {
        let output = run_captured(check, self.check_timeout, CHECK_OUTPUT_LIMIT_BYTES)?;
        let mut stderr = output.stderr_text();
        if output.timed_out {
            stderr = format!("timed out after {}s", self.check_timeout.as_secs());
        }
        Ok(CheckResult {
            success: output.success(),
            stdout: output.stdout_text(),
            stderr,
        })
    }
}

/// True when systemd is the running init system (the `sd_booted` test).
pub fn systemd_booted(run_dir: &Path) -> bool {
    run_dir.join("systemd").join("system").is_dir()
}
