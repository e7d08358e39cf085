//! Runs the installed application through its wrapper.

use std::path::Path;

use anyhow::Result;
use tracing::instrument;

use crate::core::cmdline::CommandSpec;
use crate::io::process::run_inherited;

pub trait AppLauncher {
    /// Run `wrapper args...` attached to the terminal. Non-zero exit is an error.
    fn run(&self, wrapper: &Path, args: &[String], root: &Path) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WrapperLauncher;

impl AppLauncher for WrapperLauncher {
    #[instrument(skip_all, fields(wrapper = %wrapper.display()))]
    fn run(&self, wrapper: &Path, args: &[String], root: &Path) -> Result<()> {
        let spec = CommandSpec::new(wrapper.display().to_string())
            .args(args.iter().cloned())
            .cwd(root);
        run_inherited(&spec)
    }
}
