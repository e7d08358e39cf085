//! Scripted fakes for every capability trait.
//!
//! The fakes touch the filesystem where later stages look at it (the
//! manifest after a sync, the venv after provisioning, the config artifact
//! after setup), so whole-pipeline tests can assert on real files.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, anyhow};

use crate::core::cmdline::CommandSpec;
use crate::core::fatal::{Fatal, FatalKind};
use crate::core::machine::Stage;
use crate::core::types::{HostContext, InvokingUser, PrivilegeContext};
use crate::io::config::InstallerConfig;
use crate::io::git::{RepoSource, SourceControl, SyncOutcome};
use crate::io::host::{CheckResult, HostInspector};
use crate::io::launcher::AppLauncher;
use crate::io::layout::InstallLayout;
use crate::io::package_manager::{InstallRequest, PackageManager};
use crate::io::publisher::{CommandPublisher, LinkOutcome};
use crate::io::runtime_env::{EnvRequest, RuntimeInstaller};
use crate::io::supervisor::{ServiceSupervisor, ServiceUnit};
use crate::pipeline::Capabilities;
use crate::probe::{identify, privilege_context};
use crate::report::Reporter;

const UBUNTU_OS_RELEASE: &str = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"24.04\"\nPRETTY_NAME=\"Ubuntu 24.04.1 LTS\"\n";
/// Manifest the fake upstream ships unless a test changes it.
pub const DEFAULT_MANIFEST: &str = "requests==2.32.3\n";
/// File the fake runtime writes inside the venv: the installed package set.
pub const INSTALLED_MARKER: &str = "installed.txt";

#[derive(Debug)]
struct HostState {
    os_release: Option<String>,
    kernel: String,
    arch: String,
    user: InvokingUser,
    executables: BTreeSet<String>,
    python_version: String,
    venv_works: bool,
    checks: Vec<CommandSpec>,
}

/// Scripted host. Clones share state, so a package manager can "install"
/// tools the host then reports as present.
#[derive(Debug, Clone)]
pub struct FakeHost {
    state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    /// Ubuntu host with every dependency present and working, `sudo` available.
    pub fn healthy_debian() -> Self {
        let host = Self::bare_debian();
        host.heal();
        host
    }

    /// Ubuntu host with only `sudo`: nothing the installer needs is present.
    pub fn bare_debian() -> Self {
        Self {
            state: Rc::new(RefCell::new(HostState {
                os_release: Some(UBUNTU_OS_RELEASE.to_string()),
                kernel: "Linux".to_string(),
                arch: "x86_64".to_string(),
                user: InvokingUser {
                    name: "ada".to_string(),
                    group: "ada".to_string(),
                    uid: 1000,
                },
                executables: BTreeSet::from(["sudo".to_string()]),
                python_version: "3.12.3".to_string(),
                venv_works: false,
                checks: Vec::new(),
            })),
        }
    }

    /// What a successful apt pass does.
    pub fn heal(&self) {
        let mut state = self.state.borrow_mut();
        for tool in ["git", "python3", "cc"] {
            state.executables.insert(tool.to_string());
        }
        state.venv_works = true;
    }

    pub fn set_os_release(&self, raw: Option<&str>) {
        self.state.borrow_mut().os_release = raw.map(str::to_string);
    }

    pub fn set_kernel(&self, kernel: &str) {
        self.state.borrow_mut().kernel = kernel.to_string();
    }

    pub fn set_python_version(&self, version: &str) {
        self.state.borrow_mut().python_version = version.to_string();
    }

    pub fn set_venv_works(&self, works: bool) {
        self.state.borrow_mut().venv_works = works;
    }

    pub fn remove_executable(&self, name: &str) {
        self.state.borrow_mut().executables.remove(name);
    }

    pub fn user(&self) -> InvokingUser {
        self.state.borrow().user.clone()
    }

    /// Every functional check run so far.
    pub fn checks(&self) -> Vec<CommandSpec> {
        self.state.borrow().checks.clone()
    }
}

impl HostInspector for FakeHost {
    fn os_release(&self) -> Result<Option<String>> {
        Ok(self.state.borrow().os_release.clone())
    }

    fn kernel_name(&self) -> Result<String> {
        Ok(self.state.borrow().kernel.clone())
    }

    fn architecture(&self) -> Result<String> {
        Ok(self.state.borrow().arch.clone())
    }

    fn invoking_user(&self) -> Result<InvokingUser> {
        Ok(self.user())
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.state
            .borrow()
            .executables
            .contains(name)
            .then(|| Path::new("/usr/bin").join(name))
    }

    fn run_check(&self, check: &CommandSpec) -> Result<CheckResult> {
        let mut state = self.state.borrow_mut();
        state.checks.push(check.clone());
        if !state.executables.contains(&check.program) {
            return Err(anyhow!("spawn `{check}`: No such file or directory"));
        }
        let args: Vec<&str> = check.args.iter().map(String::as_str).collect();
        let result = match (check.program.as_str(), args.as_slice()) {
            ("git", _) => CheckResult::ok("git version 2.43.0"),
            ("cc", _) => CheckResult::ok("cc (Ubuntu 13.2.0-23ubuntu4) 13.2.0"),
            (_, ["-c", ..]) => CheckResult::ok(state.python_version.clone()),
            (_, ["-m", "venv", ..]) if state.venv_works => CheckResult::ok(""),
            (_, ["-m", "venv", ..]) => CheckResult::failed(
                "The virtual environment was not created successfully because ensurepip is not available.",
            ),
            _ => CheckResult::failed(format!("unscripted check `{check}`")),
        };
        Ok(result)
    }
}

/// Host facts for stage tests that skip probing.
pub fn host_context(host: &FakeHost) -> HostContext {
    let user = host.user();
    HostContext {
        identity: identify(host).expect("fake host identity"),
        privilege: privilege_context(host, &user),
        user,
    }
}

pub struct FakePackageManager {
    heals: Option<FakeHost>,
    requests: RefCell<Vec<InstallRequest>>,
}

impl FakePackageManager {
    /// Installing anything heals every dependency on `host`.
    pub fn healing(host: &FakeHost) -> Self {
        Self {
            heals: Some(host.clone()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Every install fails and nothing changes on the host.
    pub fn ineffective() -> Self {
        Self {
            heals: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<InstallRequest> {
        self.requests.borrow().clone()
    }
}

impl PackageManager for FakePackageManager {
    fn ensure(&self, request: &InstallRequest) -> Result<()> {
        self.requests.borrow_mut().push(request.clone());
        match &self.heals {
            Some(host) => {
                host.heal();
                Ok(())
            }
            None => Err(anyhow!("E: Unable to locate package {}", request.packages.join(" "))),
        }
    }
}

enum ScmBehavior {
    Upstream,
    Dirty,
    Failing(String),
}

/// Fake upstream. A sync lays down a `.git` marker and the current manifest.
pub struct FakeSourceControl {
    behavior: ScmBehavior,
    manifest: RefCell<String>,
    syncs: RefCell<usize>,
}

impl FakeSourceControl {
    pub fn upstream() -> Self {
        Self {
            behavior: ScmBehavior::Upstream,
            manifest: RefCell::new(DEFAULT_MANIFEST.to_string()),
            syncs: RefCell::new(0),
        }
    }

    /// Working copy with local modifications.
    pub fn dirty() -> Self {
        Self {
            behavior: ScmBehavior::Dirty,
            ..Self::upstream()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: ScmBehavior::Failing(message.to_string()),
            ..Self::upstream()
        }
    }

    /// Simulate an upstream commit that changes the manifest.
    pub fn set_manifest(&self, contents: &str) {
        *self.manifest.borrow_mut() = contents.to_string();
    }

    pub fn syncs(&self) -> usize {
        *self.syncs.borrow()
    }
}

impl SourceControl for FakeSourceControl {
    fn sync(&self, _source: &RepoSource, root: &Path) -> Result<SyncOutcome> {
        *self.syncs.borrow_mut() += 1;
        match &self.behavior {
            ScmBehavior::Dirty => {
                return Err(Fatal::new(
                    FatalKind::DataIntegrity,
                    "working copy",
                    "tracked files have local modifications:\n   M main.py",
                )
                .into());
            }
            ScmBehavior::Failing(message) => return Err(anyhow!("git clone failed: {message}")),
            ScmBehavior::Upstream => {}
        }

        let marker = root.join(".git");
        let existed = marker.exists();
        fs::create_dir_all(&marker)?;
        let manifest_path = root.join("requirements.txt");
        let manifest = self.manifest.borrow().clone();
        let previous = fs::read_to_string(&manifest_path).ok();
        fs::write(&manifest_path, &manifest)?;
        fs::write(root.join("main.py"), "print('ironclaw')\n")?;

        Ok(match (existed, previous) {
            (false, _) => SyncOutcome::Cloned {
                head: "c0ffee".to_string(),
            },
            (true, Some(previous)) if previous == manifest => SyncOutcome::UpToDate {
                head: "c0ffee".to_string(),
            },
            (true, _) => SyncOutcome::Updated {
                from: "c0ffee".to_string(),
                to: "decade".to_string(),
            },
        })
    }
}

/// Fake venv: `create` (re)makes the directory, `install` copies the manifest
/// into [`INSTALLED_MARKER`] as the installed package set.
pub struct FakeRuntime {
    install_error: Option<String>,
    calls: RefCell<Vec<&'static str>>,
    requests: RefCell<Vec<EnvRequest>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            install_error: None,
            calls: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_install(message: &str) -> Self {
        Self {
            install_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn requests(&self) -> Vec<EnvRequest> {
        self.requests.borrow().clone()
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeInstaller for FakeRuntime {
    fn create_environment(&self, request: &EnvRequest) -> Result<()> {
        self.calls.borrow_mut().push("create");
        self.requests.borrow_mut().push(request.clone());
        if request.clear && request.env_dir.exists() {
            fs::remove_dir_all(&request.env_dir)?;
        }
        fs::create_dir_all(request.env_dir.join("bin"))?;
        Ok(())
    }

    fn install_manifest(&self, request: &EnvRequest) -> Result<()> {
        self.calls.borrow_mut().push("install");
        if let Some(message) = &self.install_error {
            return Err(anyhow!("pip install failed: {message}"));
        }
        fs::copy(&request.manifest, request.env_dir.join(INSTALLED_MARKER))?;
        Ok(())
    }
}

pub struct FakePublisher {
    error: Option<String>,
    links: RefCell<Vec<(PathBuf, PathBuf)>>,
}

impl FakePublisher {
    pub fn ok() -> Self {
        Self {
            error: None,
            links: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            links: RefCell::new(Vec::new()),
        }
    }

    /// `(link, target)` pairs published successfully.
    pub fn links(&self) -> Vec<(PathBuf, PathBuf)> {
        self.links.borrow().clone()
    }
}

impl CommandPublisher for FakePublisher {
    fn publish(
        &self,
        link: &Path,
        target: &Path,
        _privilege: &PrivilegeContext,
    ) -> Result<LinkOutcome> {
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        self.links
            .borrow_mut()
            .push((link.to_path_buf(), target.to_path_buf()));
        Ok(LinkOutcome::Created)
    }
}

pub struct FakeSupervisor {
    available: bool,
    error: Option<String>,
    registered: RefCell<Vec<ServiceUnit>>,
}

impl FakeSupervisor {
    pub fn available() -> Self {
        Self {
            available: true,
            error: None,
            registered: RefCell::new(Vec::new()),
        }
    }

    pub fn absent() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::available()
        }
    }

    pub fn registered(&self) -> Vec<ServiceUnit> {
        self.registered.borrow().clone()
    }
}

impl ServiceSupervisor for FakeSupervisor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn register(&self, unit: &ServiceUnit, _privilege: &PrivilegeContext) -> Result<()> {
        if let Some(message) = &self.error {
            return Err(anyhow!("systemctl enable failed: {message}"));
        }
        self.registered.borrow_mut().push(unit.clone());
        Ok(())
    }
}

/// Fake setup wizard. `configuring()` writes the config artifact like the
/// real wizard does on success.
pub struct FakeLauncher {
    error: Option<String>,
    writes_config: bool,
    runs: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl FakeLauncher {
    pub fn ok() -> Self {
        Self {
            error: None,
            writes_config: false,
            runs: RefCell::new(Vec::new()),
        }
    }

    pub fn configuring() -> Self {
        Self {
            writes_config: true,
            ..Self::ok()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn runs(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.runs.borrow().clone()
    }
}

impl AppLauncher for FakeLauncher {
    fn run(&self, wrapper: &Path, args: &[String], root: &Path) -> Result<()> {
        self.runs
            .borrow_mut()
            .push((wrapper.to_path_buf(), args.to_vec()));
        if let Some(message) = &self.error {
            return Err(anyhow!("`{}` {message}", wrapper.display()));
        }
        if self.writes_config {
            let artifact = root.join("data").join("config.json");
            fs::create_dir_all(root.join("data"))?;
            fs::write(artifact, "{\"configured\": true}\n")?;
        }
        Ok(())
    }
}

/// One fake per capability, wired for a healthy run.
pub struct Fakes {
    pub host: FakeHost,
    pub packages: FakePackageManager,
    pub scm: FakeSourceControl,
    pub runtime: FakeRuntime,
    pub publisher: FakePublisher,
    pub supervisor: FakeSupervisor,
    pub launcher: FakeLauncher,
}

impl Fakes {
    pub fn healthy() -> Self {
        let host = FakeHost::healthy_debian();
        Self {
            packages: FakePackageManager::healing(&host),
            host,
            scm: FakeSourceControl::upstream(),
            runtime: FakeRuntime::new(),
            publisher: FakePublisher::ok(),
            supervisor: FakeSupervisor::available(),
            launcher: FakeLauncher::configuring(),
        }
    }

    pub fn capabilities(&self) -> Capabilities<'_> {
        Capabilities {
            host: &self.host,
            packages: &self.packages,
            scm: &self.scm,
            runtime: &self.runtime,
            publisher: &self.publisher,
            supervisor: &self.supervisor,
            launcher: &self.launcher,
        }
    }
}

/// Config whose every path (root, link directory, unit directory) lives under `dir`.
pub fn sandbox(dir: &Path) -> (InstallerConfig, InstallLayout) {
    let mut cfg = InstallerConfig::default();
    cfg.layout.install_root = Some(dir.join("iron_claw"));
    cfg.command.link_dir = dir.join("bin");
    cfg.service.unit_dir = dir.join("units");
    let layout = InstallLayout::new(dir.join("iron_claw"), &cfg);
    (cfg, layout)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Stage(Stage),
    Ok(String),
    Note(String),
    Warn(String),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn stages(&self) -> Vec<Stage> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Stage(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Warn(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn notes(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Note(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn stage(&mut self, stage: Stage) {
        self.events.push(ReportEvent::Stage(stage));
    }

    fn ok(&mut self, message: &str) {
        self.events.push(ReportEvent::Ok(message.to_string()));
    }

    fn note(&mut self, message: &str) {
        self.events.push(ReportEvent::Note(message.to_string()));
    }

    fn warn(&mut self, message: &str) {
        self.events.push(ReportEvent::Warn(message.to_string()));
    }
}
