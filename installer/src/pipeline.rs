//! Drives the seven stages through the install state machine.
//!
//! Each stage runs to completion before the next begins. A fatal error moves
//! the machine to `Aborted` and nothing later runs; degradations are recorded
//! and the procedure continues to `Done`.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::bootstrap::bootstrap_configuration;
use crate::command::install_command;
use crate::core::machine::{InstallOutcome, Phase, Stage, StageOutcome, StageReport};
use crate::io::config::InstallerConfig;
use crate::io::git::{RepoSource, SourceControl};
use crate::io::host::HostInspector;
use crate::io::launcher::AppLauncher;
use crate::io::layout::InstallLayout;
use crate::io::package_manager::PackageManager;
use crate::io::publisher::CommandPublisher;
use crate::io::runtime_env::RuntimeInstaller;
use crate::io::supervisor::ServiceSupervisor;
use crate::probe::{ProbeReport, probe_host};
use crate::provision::provision_runtime;
use crate::remediate::remediate;
use crate::report::Reporter;
use crate::service::configure_service;
use crate::sync::sync_repository;

/// The external capabilities one install run talks to.
pub struct Capabilities<'a> {
    pub host: &'a dyn HostInspector,
    pub packages: &'a dyn PackageManager,
    pub scm: &'a dyn SourceControl,
    pub runtime: &'a dyn RuntimeInstaller,
    pub publisher: &'a dyn CommandPublisher,
    pub supervisor: &'a dyn ServiceSupervisor,
    pub launcher: &'a dyn AppLauncher,
}

/// Per-run switches from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    pub publish_link: bool,
    pub configure_service: bool,
    pub run_setup: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            publish_link: true,
            configure_service: true,
            run_setup: true,
        }
    }
}

/// Everything a stage may read. Filled in as the run progresses.
struct RunContext<'a> {
    cfg: &'a InstallerConfig,
    layout: &'a InstallLayout,
    options: InstallOptions,
    probe: Option<ProbeReport>,
}

impl RunContext<'_> {
    fn probe(&self) -> Result<&ProbeReport> {
        self.probe
            .as_ref()
            .context("host facts are not available before probing")
    }
}

#[instrument(skip_all, fields(root = %layout.root.display()))]
pub fn run_install(
    caps: &Capabilities<'_>,
    cfg: &InstallerConfig,
    layout: &InstallLayout,
    options: InstallOptions,
    reporter: &mut dyn Reporter,
) -> Result<InstallOutcome> {
    let mut ctx = RunContext {
        cfg,
        layout,
        options,
        probe: None,
    };
    let mut phase = Phase::start();
    let mut stages = Vec::new();

    while let Phase::Running(stage) = phase {
        reporter.stage(stage);
        debug!(%stage, "stage starting");
        match run_stage(stage, caps, &mut ctx, reporter) {
            Ok(outcome) => {
                report_outcome(reporter, &outcome);
                stages.push(StageReport { stage, outcome });
                phase = phase.advance();
            }
            Err(err) => {
                phase = phase.abort();
                warn!(%stage, ?phase, "stage aborted");
                return Err(err.context(format!("{stage} stage aborted")));
            }
        }
    }

    let outcome = InstallOutcome { phase, stages };
    info!(degraded = outcome.degradations().len(), "install finished");
    Ok(outcome)
}

fn run_stage(
    stage: Stage,
    caps: &Capabilities<'_>,
    ctx: &mut RunContext<'_>,
    reporter: &mut dyn Reporter,
) -> Result<StageOutcome> {
    let cfg = ctx.cfg;
    let layout = ctx.layout;
    match stage {
        Stage::Probing => {
            let report = probe_host(caps.host, &cfg.runtime)?;
            for status in &report.dependencies {
                if !status.health.is_healthy() {
                    reporter.note(&format!(
                        "{} is {}",
                        status.dependency.capability(),
                        status.health.summary()
                    ));
                }
            }
            let identity = &report.host.identity;
            let summary = format!(
                "{} ({}); {} of {} dependencies healthy",
                identity.pretty_name.as_deref().unwrap_or(&identity.id),
                identity.arch,
                report.dependencies.len() - report.unhealthy().len(),
                report.dependencies.len()
            );
            ctx.probe = Some(report);
            Ok(StageOutcome::Completed(summary))
        }
        Stage::Remediating => remediate(caps.host, caps.packages, ctx.probe()?, &cfg.runtime),
        Stage::Syncing => {
            let source = RepoSource {
                url: cfg.repository.url.clone(),
                branch: cfg.repository.branch.clone(),
            };
            sync_repository(caps.scm, &source, layout)
        }
        Stage::Provisioning => provision_runtime(caps.runtime, layout, &cfg.runtime),
        Stage::InstallingCommand => install_command(
            caps.publisher,
            layout,
            &ctx.probe()?.host.privilege,
            cfg.command.publish && ctx.options.publish_link,
        ),
        Stage::ConfiguringService => configure_service(
            caps.supervisor,
            layout,
            &ctx.probe()?.host,
            &cfg.service,
            ctx.options.configure_service,
        ),
        Stage::Bootstrapping => bootstrap_configuration(
            caps.launcher,
            layout,
            &cfg.setup,
            &cfg.command.name,
            ctx.options.run_setup,
        ),
    }
}

fn report_outcome(reporter: &mut dyn Reporter, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Completed(msg) => reporter.ok(msg),
        StageOutcome::Skipped(msg) => reporter.note(msg),
        StageOutcome::Degraded(msg) => reporter.warn(msg),
    }
}
