//! Configuration Bootstrapper stage.
//!
//! Only the configuration artifact's existence matters. Its contents belong
//! to the application.

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::fatal::{Fatal, FatalKind};
use crate::core::machine::StageOutcome;
use crate::io::config::SetupConfig;
use crate::io::launcher::AppLauncher;
use crate::io::layout::InstallLayout;

#[instrument(skip_all, fields(artifact = %layout.config_artifact_path.display()))]
pub fn bootstrap_configuration(
    launcher: &dyn AppLauncher,
    layout: &InstallLayout,
    cfg: &SetupConfig,
    command_name: &str,
    run_setup: bool,
) -> Result<StageOutcome> {
    if layout.config_artifact_path.exists() {
        return Ok(StageOutcome::Skipped(format!(
            "already configured ({})",
            layout.config_artifact_path.display()
        )));
    }
    if !run_setup {
        return Ok(StageOutcome::Skipped(format!(
            "setup deferred; run `{command_name} {}` to configure",
            cfg.subcommand
        )));
    }

    info!("launching interactive setup");
    launcher
        .run(&layout.wrapper_path, &[cfg.subcommand.clone()], &layout.root)
        .map_err(|err| {
            Fatal::new(
                FatalKind::Setup,
                "application setup",
                format!("{err:#}"),
            )
            .with_remedy(format!(
                "run `{command_name} {}` to finish configuration",
                cfg.subcommand
            ))
        })?;
    Ok(StageOutcome::Completed("application configured".to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::fatal::find_fatal;
    use crate::io::config::InstallerConfig;
    use crate::test_support::FakeLauncher;

    #[test]
    fn existing_artifact_skips_wizard() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = InstallLayout::new(temp.path(), &InstallerConfig::default());
        fs::create_dir_all(temp.path().join("data")).expect("mkdir");
        fs::write(&layout.config_artifact_path, "not even json").expect("write");
        let launcher = FakeLauncher::ok();

        let outcome = bootstrap_configuration(
            &launcher,
            &layout,
            &SetupConfig::default(),
            "ironclaw",
            true,
        )
        .expect("bootstrap");
        assert!(matches!(outcome, StageOutcome::Skipped(msg) if msg.contains("already configured")));
        assert!(launcher.runs().is_empty());
    }

    #[test]
    fn missing_artifact_runs_setup_through_wrapper() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = InstallLayout::new(temp.path(), &InstallerConfig::default());
        let launcher = FakeLauncher::ok();

        bootstrap_configuration(&launcher, &layout, &SetupConfig::default(), "ironclaw", true)
            .expect("bootstrap");
        let runs = launcher.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].0, layout.wrapper_path);
        assert_eq!(runs[0].1, vec!["setup".to_string()]);
    }

    #[test]
    fn wizard_failure_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = InstallLayout::new(temp.path(), &InstallerConfig::default());
        let launcher = FakeLauncher::failing("exited with status 1");

        let err = bootstrap_configuration(
            &launcher,
            &layout,
            &SetupConfig::default(),
            "ironclaw",
            true,
        )
        .expect_err("setup failed");
        assert_eq!(find_fatal(&err).map(|f| f.kind), Some(FatalKind::Setup));
    }
}
