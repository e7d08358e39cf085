//! IronClaw host installer.
//!
//! `installer` (or `installer install`) runs the full bootstrap procedure;
//! `installer probe` reports what the host has; `installer paths` prints the
//! install layout.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use installer::core::fatal::find_fatal;
use installer::core::machine::{InstallOutcome, Stage, StageOutcome};
use installer::core::types::PrivilegeContext;
use installer::exit_codes;
use installer::io::config::{InstallerConfig, load_config};
use installer::io::git::GitSourceControl;
use installer::io::host::SystemHost;
use installer::io::launcher::WrapperLauncher;
use installer::io::layout::InstallLayout;
use installer::io::package_manager::SystemPackageManager;
use installer::io::publisher::SymlinkPublisher;
use installer::io::runtime_env::PythonVenv;
use installer::io::supervisor::Systemd;
use installer::logging;
use installer::pipeline::{Capabilities, InstallOptions, run_install};
use installer::probe::{ProbeReport, probe_host};
use installer::report::Console;

#[derive(Parser)]
#[command(
    name = "installer",
    version,
    about = "Install IronClaw on this host: dependencies, source, runtime, command and service"
)]
struct Cli {
    /// Installer config file (TOML). Built-in defaults apply when omitted.
    #[arg(long, env = "IRONCLAW_INSTALLER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    install: InstallArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct InstallArgs {
    /// Install root (default: ~/.iron_claw).
    #[arg(long, env = "IRONCLAW_ROOT", global = true)]
    install_root: Option<PathBuf>,
    /// Upstream repository to clone.
    #[arg(long, env = "IRONCLAW_REPO_URL", global = true)]
    repo_url: Option<String>,
    /// Branch to clone instead of the remote default.
    #[arg(long, global = true)]
    branch: Option<String>,
    /// Do not publish the global command link.
    #[arg(long, global = true)]
    no_link: bool,
    /// Do not register the background service.
    #[arg(long, global = true)]
    no_service: bool,
    /// Skip the interactive setup wizard.
    #[arg(long, global = true)]
    no_setup: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full install (the default).
    Install,
    /// Inspect the host and report dependency health without changing anything.
    Probe {
        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved install layout.
    Paths,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            std::process::exit(code);
        }
    };
    logging::init();

    let console = Console::detect();
    let code = match run(cli, console) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            let fatal = find_fatal(&err);
            console.error(
                &format!("{err:#}"),
                fatal.and_then(|fatal| fatal.remedy.as_deref()),
            );
            fatal.map_or(exit_codes::INVALID, |fatal| fatal.kind.exit_code())
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli, console: Console) -> Result<()> {
    let cfg = resolve_config(&cli)?;
    match cli.command.unwrap_or(Command::Install) {
        Command::Install => cmd_install(&cfg, &cli.install, console),
        Command::Probe { json } => cmd_probe(&cfg, json),
        Command::Paths => cmd_paths(&cfg),
    }
}

fn resolve_config(cli: &Cli) -> Result<InstallerConfig> {
    let mut cfg = match &cli.config {
        Some(path) if !path.exists() => bail!("config file {} does not exist", path.display()),
        Some(path) => load_config(path)?,
        None => InstallerConfig::default(),
    };
    if let Some(root) = &cli.install.install_root {
        cfg.layout.install_root = Some(root.clone());
    }
    if let Some(url) = &cli.install.repo_url {
        cfg.repository.url = url.clone();
    }
    if let Some(branch) = &cli.install.branch {
        cfg.repository.branch = Some(branch.clone());
    }
    cfg.validate().context("invalid installer settings")?;
    Ok(cfg)
}

fn system_host(cfg: &InstallerConfig) -> SystemHost {
    SystemHost::new(Duration::from_secs(cfg.probe.check_timeout_secs))
}

fn cmd_install(cfg: &InstallerConfig, args: &InstallArgs, mut console: Console) -> Result<()> {
    let layout = InstallLayout::resolve(cfg)?;
    let host = system_host(cfg);
    let supervisor = Systemd::new();
    let caps = Capabilities {
        host: &host,
        packages: &SystemPackageManager,
        scm: &GitSourceControl,
        runtime: &PythonVenv,
        publisher: &SymlinkPublisher,
        supervisor: &supervisor,
        launcher: &WrapperLauncher,
    };
    let options = InstallOptions {
        publish_link: !args.no_link,
        configure_service: !args.no_service,
        run_setup: !args.no_setup,
    };

    let outcome = run_install(&caps, cfg, &layout, options, &mut console)?;
    print_summary(cfg, &layout, &outcome);
    Ok(())
}

fn print_summary(cfg: &InstallerConfig, layout: &InstallLayout, outcome: &InstallOutcome) {
    println!();
    println!("IronClaw is installed in {}.", layout.root.display());
    let degraded = outcome.degradations();
    if !degraded.is_empty() {
        println!(
            "{} optional step(s) did not complete; see the warnings above.",
            degraded.len()
        );
    }
    let command = match outcome.outcome_of(Stage::InstallingCommand) {
        Some(StageOutcome::Completed(_)) => cfg.command.name.clone(),
        _ => layout.wrapper_path.display().to_string(),
    };
    println!("Start it with `{command} {}`.", cfg.service.start_command);
}

fn cmd_probe(cfg: &InstallerConfig, json: bool) -> Result<()> {
    let host = system_host(cfg);
    let report = probe_host(&host, &cfg.runtime)?;
    if json {
        let out = serde_json::to_string_pretty(&report).context("serialize probe report")?;
        println!("{out}");
        return Ok(());
    }
    for line in format_probe_report(&report) {
        println!("{line}");
    }
    Ok(())
}

fn format_probe_report(report: &ProbeReport) -> Vec<String> {
    let identity = &report.host.identity;
    let mut lines = vec![format!(
        "host: {} ({}, family {}, {})",
        identity.pretty_name.as_deref().unwrap_or(&identity.id),
        identity.id,
        identity.family,
        identity.arch
    )];
    lines.push(format!(
        "privilege: {}",
        describe_privilege(&report.host.privilege)
    ));
    let user = &report.host.user;
    lines.push(format!(
        "user: {} (group {}, uid {})",
        user.name, user.group, user.uid
    ));
    for status in &report.dependencies {
        lines.push(format!(
            "{}: {}",
            status.dependency.capability(),
            status.health.summary()
        ));
    }
    lines
}

fn describe_privilege(privilege: &PrivilegeContext) -> String {
    match (&privilege.elevation, privilege.superuser) {
        (_, true) => "superuser".to_string(),
        (Some(tool), false) => format!("elevation via {tool}"),
        (None, false) => "unprivileged, no elevation tool".to_string(),
    }
}

fn cmd_paths(cfg: &InstallerConfig) -> Result<()> {
    let layout = InstallLayout::resolve(cfg)?;
    for (label, path) in layout.rows() {
        println!("{label:<12} {}", path.display());
    }
    Ok(())
}
