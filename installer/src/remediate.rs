//! Dependency Remediator: one best-effort package-manager pass, then re-check.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::fatal::{Fatal, FatalKind};
use crate::core::machine::StageOutcome;
use crate::core::remediation::{PackageManagerKind, manual_remedy, plan_remediation};
use crate::core::types::{Dependency, DependencyStatus};
use crate::io::config::RuntimeConfig;
use crate::io::host::HostInspector;
use crate::io::package_manager::{InstallRequest, PackageManager};
use crate::probe::{ProbeReport, check_dependency};

#[instrument(skip_all, fields(unhealthy = report.unhealthy().len()))]
pub fn remediate(
    host: &dyn HostInspector,
    packages: &dyn PackageManager,
    report: &ProbeReport,
    runtime: &RuntimeConfig,
) -> Result<StageOutcome> {
    let unhealthy = report.unhealthy();
    if unhealthy.is_empty() {
        return Ok(StageOutcome::Skipped(
            "all dependencies are healthy".to_string(),
        ));
    }

    let family = &report.host.identity.family;
    let Some(kind) = PackageManagerKind::for_family(family) else {
        warn!(%family, "no package manager known for this host");
        return Err(Fatal::new(
            FatalKind::Environment,
            capabilities(&unhealthy),
            format!("missing or broken on '{family}', which has no supported package manager"),
        )
        .with_remedy(remedies(None, &unhealthy))
        .into());
    };

    let plan = plan_remediation(kind, &unhealthy);
    if !plan.unremediable.is_empty() {
        return Err(Fatal::new(
            FatalKind::Dependency,
            capabilities(&plan.unremediable),
            format!("cannot be installed with {}", kind.program()),
        )
        .with_remedy(remedies(Some(kind), &plan.unremediable))
        .into());
    }

    let privilege = &report.host.privilege;
    if kind.requires_elevation() && !privilege.can_elevate() {
        return Err(Fatal::new(
            FatalKind::Environment,
            "superuser privilege",
            format!(
                "installing {} with {} needs root, and no elevation tool is available",
                plan.packages.join(" "),
                kind.program()
            ),
        )
        .with_remedy("re-run the installer as root or install sudo")
        .into());
    }

    let request = InstallRequest {
        manager: kind,
        privilege: privilege.clone(),
        packages: plan.packages.clone(),
    };
    info!(packages = ?request.packages, "remediating");
    // A failed install is not fatal by itself; the re-check decides.
    let install_error = packages.ensure(&request).err();
    if let Some(err) = &install_error {
        warn!(err = %err, "package install reported failure");
    }

    let still_unhealthy: Vec<DependencyStatus> = unhealthy
        .iter()
        .map(|&dependency| DependencyStatus {
            dependency,
            health: check_dependency(host, dependency, runtime),
        })
        .filter(|status| !status.health.is_healthy())
        .collect();
    if !still_unhealthy.is_empty() {
        let names: Vec<Dependency> = still_unhealthy.iter().map(|s| s.dependency).collect();
        let mut detail = still_unhealthy
            .iter()
            .map(|s| format!("{} is {}", s.dependency.capability(), s.health.summary()))
            .collect::<Vec<_>>()
            .join("; ");
        if let Some(err) = install_error {
            detail.push_str(&format!(" (package install failed: {err:#})"));
        }
        return Err(Fatal::new(FatalKind::Dependency, capabilities(&names), detail)
            .with_remedy(remedies(Some(kind), &names))
            .into());
    }

    Ok(StageOutcome::Completed(format!(
        "installed {} with {}",
        plan.packages.join(" "),
        kind.program()
    )))
}

fn capabilities(dependencies: &[Dependency]) -> String {
    dependencies
        .iter()
        .map(|dependency| dependency.capability())
        .collect::<Vec<_>>()
        .join(", ")
}

fn remedies(kind: Option<PackageManagerKind>, dependencies: &[Dependency]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for &dependency in dependencies {
        let remedy = manual_remedy(kind, dependency);
        if !lines.contains(&remedy) {
            lines.push(remedy);
        }
    }
    lines.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fatal::find_fatal;
    use crate::core::types::PrivilegeContext;
    use crate::probe::probe_host;
    use crate::test_support::{FakeHost, FakePackageManager};

    fn runtime() -> RuntimeConfig {
        RuntimeConfig::default()
    }

    #[test]
    fn healthy_host_never_calls_package_manager() {
        let host = FakeHost::healthy_debian();
        let packages = FakePackageManager::healing(&host);
        let report = probe_host(&host, &runtime()).expect("probe");

        let outcome = remediate(&host, &packages, &report, &runtime()).expect("remediate");
        assert!(matches!(outcome, StageOutcome::Skipped(_)));
        assert!(packages.requests().is_empty());
    }

    #[test]
    fn one_batched_install_then_recheck() {
        let host = FakeHost::bare_debian();
        let packages = FakePackageManager::healing(&host);
        let report = probe_host(&host, &runtime()).expect("probe");
        assert_eq!(report.unhealthy().len(), 4);

        let outcome = remediate(&host, &packages, &report, &runtime()).expect("remediate");
        assert!(matches!(outcome, StageOutcome::Completed(_)));
        let requests = packages.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].manager, PackageManagerKind::Apt);
        assert_eq!(
            requests[0].packages,
            vec!["git", "python3", "python3-venv", "build-essential", "python3-dev"]
        );
    }

    #[test]
    fn no_second_attempt_when_install_does_not_heal() {
        let host = FakeHost::bare_debian();
        let packages = FakePackageManager::ineffective();
        let report = probe_host(&host, &runtime()).expect("probe");

        let err = remediate(&host, &packages, &report, &runtime()).expect_err("still broken");
        let fatal = find_fatal(&err).expect("fatal");
        assert_eq!(fatal.kind, FatalKind::Dependency);
        assert!(fatal.capability.contains("git client"));
        assert_eq!(packages.requests().len(), 1);
    }

    #[test]
    fn unknown_family_is_fatal_without_guessing() {
        let host = FakeHost::bare_debian();
        host.set_os_release(Some("ID=gentoo\n"));
        let packages = FakePackageManager::healing(&host);
        let report = probe_host(&host, &runtime()).expect("probe");

        let err = remediate(&host, &packages, &report, &runtime()).expect_err("unknown");
        let fatal = find_fatal(&err).expect("fatal");
        assert_eq!(fatal.kind, FatalKind::Environment);
        assert!(fatal.remedy.as_deref().unwrap_or_default().contains("manually"));
        assert!(packages.requests().is_empty());
    }

    #[test]
    fn missing_elevation_is_fatal_before_installing() {
        let host = FakeHost::bare_debian();
        host.remove_executable("sudo");
        let packages = FakePackageManager::healing(&host);
        let mut report = probe_host(&host, &runtime()).expect("probe");
        report.host.privilege = PrivilegeContext::unprivileged();

        let err = remediate(&host, &packages, &report, &runtime()).expect_err("no sudo");
        assert_eq!(
            find_fatal(&err).map(|f| f.kind),
            Some(FatalKind::Environment)
        );
        assert!(packages.requests().is_empty());
    }
}
