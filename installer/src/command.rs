//! Command Installer stage: the wrapper script and its global link.
//!
//! The wrapper is part of the installed artifact, so failing to write it is
//! fatal. The link is a convenience; failing to publish it only degrades.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::core::fatal::{FatalKind, classify};
use crate::core::machine::StageOutcome;
use crate::core::render::{WrapperInputs, render_wrapper};
use crate::core::types::PrivilegeContext;
use crate::io::layout::InstallLayout;
use crate::io::publisher::{CommandPublisher, LinkOutcome};

const WRAPPER_MODE: u32 = 0o755;

#[instrument(skip_all, fields(wrapper = %layout.wrapper_path.display()))]
pub fn install_command(
    publisher: &dyn CommandPublisher,
    layout: &InstallLayout,
    privilege: &PrivilegeContext,
    publish_link: bool,
) -> Result<StageOutcome> {
    write_wrapper(layout)
        .map_err(|err| classify(err, FatalKind::Provisioning, "wrapper script", None))?;
    let wrapper = layout.wrapper_path.display();

    if !publish_link {
        return Ok(StageOutcome::Skipped(format!(
            "wrapper written to {wrapper}; global command not requested"
        )));
    }

    match publisher.publish(&layout.link_path, &layout.wrapper_path, privilege) {
        Ok(LinkOutcome::AlreadyCurrent) => Ok(StageOutcome::Completed(format!(
            "wrapper written; {} already points at it",
            layout.link_path.display()
        ))),
        Ok(LinkOutcome::Created | LinkOutcome::CreatedElevated) => {
            Ok(StageOutcome::Completed(format!(
                "wrapper written; linked {} -> {wrapper}",
                layout.link_path.display()
            )))
        }
        Err(err) => {
            warn!(err = %err, "global command link not published");
            Ok(StageOutcome::Degraded(format!(
                "could not publish {}: {err:#}; run {wrapper} directly",
                layout.link_path.display()
            )))
        }
    }
}

/// Render and atomically replace the wrapper script.
pub fn write_wrapper(layout: &InstallLayout) -> Result<()> {
    let script = render_wrapper(&WrapperInputs {
        install_root: &layout.root,
        env_dir: &layout.env_dir,
        entry_point: &layout.entry_point,
    })?;
    write_executable(&layout.wrapper_path, &script)
}

fn write_executable(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut tmp = NamedTempFile::new_in(dir).context("create temp file")?;
    tmp.write_all(contents.as_bytes()).context("write temp file")?;
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(WRAPPER_MODE))
        .context("chmod temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace {}", path.display()))?;
    debug!(path = %path.display(), "wrote executable");
    Ok(())
}
