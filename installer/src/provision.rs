//! Runtime Provisioner stage.
//!
//! Runs on every invocation. With `clear_environment` the venv is rebuilt
//! from scratch, so after a successful run its package set is exactly what
//! the current manifest declares. No rollback on failure.

use anyhow::Result;
use tracing::instrument;

use crate::core::fatal::{Fatal, FatalKind, classify};
use crate::core::machine::StageOutcome;
use crate::io::config::RuntimeConfig;
use crate::io::layout::InstallLayout;
use crate::io::runtime_env::{EnvRequest, RuntimeInstaller};

const REMEDY: &str = "fix the reported error and re-run the installer";

#[instrument(skip_all, fields(env_dir = %layout.env_dir.display()))]
pub fn provision_runtime(
    runtime: &dyn RuntimeInstaller,
    layout: &InstallLayout,
    cfg: &RuntimeConfig,
) -> Result<StageOutcome> {
    if !layout.manifest_path.is_file() {
        return Err(Fatal::new(
            FatalKind::Provisioning,
            "dependency manifest",
            format!("{} not found in the working copy", layout.manifest_path.display()),
        )
        .into());
    }

    let request = EnvRequest {
        root: layout.root.clone(),
        env_dir: layout.env_dir.clone(),
        manifest: layout.manifest_path.clone(),
        interpreter: cfg.interpreter.clone(),
        clear: cfg.clear_environment,
    };
    runtime
        .create_environment(&request)
        .map_err(|err| classify(err, FatalKind::Provisioning, "runtime environment", Some(REMEDY)))?;
    runtime
        .install_manifest(&request)
        .map_err(|err| classify(err, FatalKind::Provisioning, "dependency install", Some(REMEDY)))?;

    Ok(StageOutcome::Completed(format!(
        "environment ready at {}",
        layout.env_dir.display()
    )))
}
