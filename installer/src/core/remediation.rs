//! Remediation planning: which packages heal which dependency, and the exact
//! package-manager command lines to install them.
//!
//! Only families listed in [`PackageManagerKind::for_family`] are remediated.
//! For anything else the installer never guesses at a package manager's syntax.

use serde::Serialize;

use super::cmdline::CommandSpec;
use super::types::{Dependency, OsFamily};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManagerKind {
    Apt,
    Dnf,
    Pacman,
    Apk,
    Zypper,
    Brew,
}

impl PackageManagerKind {
    pub fn for_family(family: &OsFamily) -> Option<Self> {
        match family {
            OsFamily::Debian => Some(Self::Apt),
            OsFamily::Fedora => Some(Self::Dnf),
            OsFamily::Arch => Some(Self::Pacman),
            OsFamily::Alpine => Some(Self::Apk),
            OsFamily::Suse => Some(Self::Zypper),
            OsFamily::MacOs => Some(Self::Brew),
            OsFamily::Unknown(_) => None,
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Apk => "apk",
            Self::Zypper => "zypper",
            Self::Brew => "brew",
        }
    }

    /// Homebrew refuses to run as root; every other manager needs it.
    pub fn requires_elevation(self) -> bool {
        !matches!(self, Self::Brew)
    }

    /// Index refresh to run before installing, if the manager needs one.
    ///
    /// pacman refreshes as part of its install transaction instead: a bare
    /// `-Sy` would leave the host partially upgraded.
    pub fn refresh_command(self) -> Option<CommandSpec> {
        match self {
            Self::Apt => Some(CommandSpec::new("apt-get").arg("update")),
            Self::Apk => Some(CommandSpec::new("apk").arg("update")),
            Self::Dnf | Self::Pacman | Self::Zypper | Self::Brew => None,
        }
    }

    pub fn install_command(self, packages: &[String]) -> CommandSpec {
        let base = match self {
            Self::Apt => CommandSpec::new("apt-get").args(["install", "-y"]),
            Self::Dnf => CommandSpec::new("dnf").args(["install", "-y"]),
            Self::Pacman => CommandSpec::new("pacman").args(["-Syu", "--needed", "--noconfirm"]),
            Self::Apk => CommandSpec::new("apk").arg("add"),
            Self::Zypper => CommandSpec::new("zypper").args(["--non-interactive", "install"]),
            Self::Brew => CommandSpec::new("brew").arg("install"),
        };
        base.args(packages.iter().cloned())
    }
}

/// Packages that provide `dependency` on `kind`'s distributions.
///
/// An empty list means the dependency cannot be installed through the package
/// manager (the Xcode command line tools on macOS, for example).
pub fn packages_for(kind: PackageManagerKind, dependency: Dependency) -> &'static [&'static str] {
    use PackageManagerKind::{Apk, Apt, Brew, Dnf, Pacman, Zypper};

    match (kind, dependency) {
        (_, Dependency::SourceControl) => &["git"],

        (Apt, Dependency::Runtime) => &["python3"],
        (Apt, Dependency::IsolatedEnv) => &["python3-venv"],
        (Apt, Dependency::NativeToolchain) => &["build-essential", "python3-dev"],

        (Dnf, Dependency::Runtime | Dependency::IsolatedEnv) => &["python3"],
        (Dnf, Dependency::NativeToolchain) => &["gcc", "gcc-c++", "make", "python3-devel"],

        (Pacman, Dependency::Runtime | Dependency::IsolatedEnv) => &["python"],
        (Pacman, Dependency::NativeToolchain) => &["base-devel"],

        (Apk, Dependency::Runtime) => &["python3"],
        (Apk, Dependency::IsolatedEnv) => &["python3", "py3-pip"],
        (Apk, Dependency::NativeToolchain) => &["build-base", "python3-dev"],

        (Zypper, Dependency::Runtime | Dependency::IsolatedEnv) => &["python3"],
        (Zypper, Dependency::NativeToolchain) => &["gcc", "gcc-c++", "make", "python3-devel"],

        (Brew, Dependency::Runtime | Dependency::IsolatedEnv) => &["python"],
        (Brew, Dependency::NativeToolchain) => &[],
    }
}

/// Manual remedy for a dependency the package manager cannot provide.
pub fn manual_remedy(kind: Option<PackageManagerKind>, dependency: Dependency) -> String {
    match (kind, dependency) {
        (Some(PackageManagerKind::Brew), Dependency::NativeToolchain) => {
            "install the Xcode command line tools (`xcode-select --install`) and re-run the installer"
                .to_string()
        }
        _ => format!(
            "install a working {} manually and re-run the installer",
            dependency.capability()
        ),
    }
}

/// One remediation pass: the packages to install and the dependencies that
/// have no package-manager remedy on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPlan {
    pub manager: PackageManagerKind,
    pub packages: Vec<String>,
    pub unremediable: Vec<Dependency>,
}

pub fn plan_remediation(manager: PackageManagerKind, unhealthy: &[Dependency]) -> RemediationPlan {
    let mut packages: Vec<String> = Vec::new();
    let mut unremediable = Vec::new();
    for &dependency in unhealthy {
        let provided = packages_for(manager, dependency);
        if provided.is_empty() {
            unremediable.push(dependency);
            continue;
        }
        for package in provided {
            if !packages.iter().any(|existing| existing == package) {
                packages.push((*package).to_string());
            }
        }
    }
    RemediationPlan {
        manager,
        packages,
        unremediable,
    }
}
