//! Isolated runtime environment adapter (Python venv + pip).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::cmdline::CommandSpec;
use crate::io::process::run_inherited;

/// Where and how to build the application's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvRequest {
    pub root: PathBuf,
    pub env_dir: PathBuf,
    pub manifest: PathBuf,
    pub interpreter: String,
    /// Recreate the environment instead of reusing an existing one.
    pub clear: bool,
}

impl EnvRequest {
    /// Interpreter inside the environment.
    pub fn env_python(&self) -> PathBuf {
        env_python(&self.env_dir)
    }
}

pub trait RuntimeInstaller {
    fn create_environment(&self, request: &EnvRequest) -> Result<()>;
    /// Install every package listed in the manifest into the environment.
    fn install_manifest(&self, request: &EnvRequest) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonVenv;

impl RuntimeInstaller for PythonVenv {
    #[instrument(skip_all, fields(env_dir = %request.env_dir.display(), clear = request.clear))]
    fn create_environment(&self, request: &EnvRequest) -> Result<()> {
        let spec = venv_command(&request.interpreter, &request.env_dir, request.clear)
            .cwd(&request.root);
        debug!(command = %spec, "creating environment");
        run_inherited(&spec).context("create virtual environment")?;
        Ok(())
    }

    #[instrument(skip_all, fields(manifest = %request.manifest.display()))]
    fn install_manifest(&self, request: &EnvRequest) -> Result<()> {
        let python = request.env_python();
        let upgrade = CommandSpec::new(python.display().to_string())
            .args(["-m", "pip", "install", "--upgrade", "pip"])
            .cwd(&request.root);
        run_inherited(&upgrade).context("upgrade pip")?;

        let install = CommandSpec::new(python.display().to_string())
            .args(["-m", "pip", "install", "-r"])
            .arg(request.manifest.display().to_string())
            .cwd(&request.root);
        info!(command = %install, "installing manifest");
        run_inherited(&install).context("install manifest")?;
        Ok(())
    }
}

/// `<interpreter> -m venv [--clear] <dir>`.
pub fn venv_command(interpreter: &str, env_dir: &Path, clear: bool) -> CommandSpec {
    let mut spec = CommandSpec::new(interpreter).args(["-m", "venv"]);
    if clear {
        spec = spec.arg("--clear");
    }
    spec.arg(env_dir.display().to_string())
}

pub fn env_python(env_dir: &Path) -> PathBuf {
    env_dir.join("bin").join("python")
}
