//! Publishes the wrapper as a global command via a symbolic link.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::cmdline::CommandSpec;
use crate::core::types::PrivilegeContext;
use crate::io::process::run_inherited;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// Link already resolved to the wrapper; nothing touched.
    AlreadyCurrent,
    /// Directory was not writable; the link was created through the elevation tool.
    CreatedElevated,
}

pub trait CommandPublisher {
    fn publish(&self, link: &Path, target: &Path, privilege: &PrivilegeContext)
    -> Result<LinkOutcome>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkPublisher;

impl CommandPublisher for SymlinkPublisher {
    #[instrument(skip_all, fields(link = %link.display(), target = %target.display()))]
    fn publish(
        &self,
        link: &Path,
        target: &Path,
        privilege: &PrivilegeContext,
    ) -> Result<LinkOutcome> {
        match fs::symlink_metadata(link) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let current = fs::read_link(link)
                    .with_context(|| format!("read link {}", link.display()))?;
                if current == target {
                    debug!("link already current");
                    return Ok(LinkOutcome::AlreadyCurrent);
                }
            }
            Ok(_) => {
                return Err(anyhow!(
                    "{} exists and is not a symbolic link; refusing to replace it",
                    link.display()
                ));
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err).with_context(|| format!("inspect {}", link.display())),
        }

        match link_directly(link, target) {
            Ok(()) => {
                info!("published command");
                Ok(LinkOutcome::Created)
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                debug!("link directory not writable, elevating");
                link_elevated(link, target, privilege)?;
                info!("published command with elevation");
                Ok(LinkOutcome::CreatedElevated)
            }
            Err(err) => Err(err).with_context(|| format!("link {}", link.display())),
        }
    }
}

fn link_directly(link: &Path, target: &Path) -> std::io::Result<()> {
    if let Some(dir) = link.parent() {
        fs::create_dir_all(dir)?;
    }
    match fs::remove_file(link) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    symlink(target, link)
}

fn link_elevated(link: &Path, target: &Path, privilege: &PrivilegeContext) -> Result<()> {
    if let Some(dir) = link.parent() {
        let mkdir = privilege.elevate(
            CommandSpec::new("mkdir")
                .arg("-p")
                .arg(dir.display().to_string()),
        )?;
        run_inherited(&mkdir)?;
    }
    let ln = privilege.elevate(
        CommandSpec::new("ln")
            .arg("-sfn")
            .arg(target.display().to_string())
            .arg(link.display().to_string()),
    )?;
    run_inherited(&ln)
}
