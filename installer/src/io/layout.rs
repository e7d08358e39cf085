//! Canonical paths produced by the installer.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::config::InstallerConfig;

/// Default install root under the invoking user's home.
pub const DEFAULT_ROOT_DIR: &str = ".iron_claw";

/// All canonical paths for one install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub root: PathBuf,
    pub env_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub entry_point: String,
    pub wrapper_path: PathBuf,
    pub config_artifact_path: PathBuf,
    pub link_path: PathBuf,
    pub unit_path: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, cfg: &InstallerConfig) -> Self {
        let root = root.into();
        Self {
            env_dir: root.join(&cfg.layout.env_dir),
            manifest_path: root.join(&cfg.layout.manifest),
            entry_point: cfg.layout.entry_point.clone(),
            wrapper_path: root.join(&cfg.layout.wrapper),
            config_artifact_path: root.join(&cfg.layout.config_artifact),
            link_path: cfg.command.link_dir.join(&cfg.command.name),
            unit_path: cfg
                .service
                .unit_dir
                .join(format!("{}.service", cfg.service.name)),
            root,
        }
    }

    /// Resolve the layout from config, reading `HOME` for the default root.
    /// Relative roots are anchored at the current directory.
    pub fn resolve(cfg: &InstallerConfig) -> Result<Self> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let cwd = std::env::current_dir().context("read current directory")?;
        let root = resolve_root(cfg.layout.install_root.as_deref(), home.as_deref(), &cwd)?;
        Ok(Self::new(root, cfg))
    }

    /// `(label, path)` rows for display.
    pub fn rows(&self) -> Vec<(&'static str, &Path)> {
        vec![
            ("root", self.root.as_path()),
            ("environment", self.env_dir.as_path()),
            ("manifest", self.manifest_path.as_path()),
            ("wrapper", self.wrapper_path.as_path()),
            ("config", self.config_artifact_path.as_path()),
            ("link", self.link_path.as_path()),
            ("unit", self.unit_path.as_path()),
        ]
    }
}

fn resolve_root(configured: Option<&Path>, home: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let Some(path) = configured else {
        let home = home.context("HOME is not set; cannot resolve default install root")?;
        return Ok(home.join(DEFAULT_ROOT_DIR));
    };
    let root = match path.strip_prefix("~") {
        Ok(rest) => {
            let home = home.context("HOME is not set; cannot expand '~' in install root")?;
            home.join(rest)
        }
        Err(_) => {
            if let Some(Component::Normal(first)) = path.components().next() {
                let first = first.to_string_lossy();
                if first.starts_with('~') {
                    bail!(
                        "cannot expand '{first}' in install root {}; use an absolute path",
                        path.display()
                    );
                }
            }
            path.to_path_buf()
        }
    };
    if root.is_absolute() {
        Ok(root)
    } else {
        Ok(cwd.join(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CWD: &str = "/srv/work";

    #[test]
    fn default_root_lives_under_home() {
        let root = resolve_root(None, Some(Path::new("/home/ada")), Path::new(CWD)).expect("root");
        assert_eq!(root, PathBuf::from("/home/ada/.iron_claw"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let root = resolve_root(
            Some(Path::new("~/apps/claw")),
            Some(Path::new("/home/ada")),
            Path::new(CWD),
        )
        .expect("root");
        assert_eq!(root, PathBuf::from("/home/ada/apps/claw"));
    }

    #[test]
    fn relative_root_is_anchored_at_cwd() {
        let root = resolve_root(Some(Path::new("claw")), None, Path::new(CWD)).expect("root");
        assert_eq!(root, PathBuf::from("/srv/work/claw"));

        let layout = InstallLayout::new(root, &InstallerConfig::default());
        assert_eq!(layout.env_dir, PathBuf::from("/srv/work/claw/venv"));
        assert_eq!(layout.wrapper_path, PathBuf::from("/srv/work/claw/ironclaw"));
    }

    #[test]
    fn other_users_home_is_rejected() {
        let err = resolve_root(
            Some(Path::new("~bob/claw")),
            Some(Path::new("/home/ada")),
            Path::new(CWD),
        )
        .expect_err("~user");
        assert!(err.to_string().contains("~bob"), "{err:#}");
    }

    #[test]
    fn missing_home_is_an_error_only_when_needed() {
        assert!(resolve_root(None, None, Path::new(CWD)).is_err());
        assert_eq!(
            resolve_root(Some(Path::new("/opt/claw")), None, Path::new(CWD)).expect("root"),
            PathBuf::from("/opt/claw")
        );
    }

    #[test]
    fn layout_joins_configured_names() {
        let cfg = InstallerConfig::default();
        let layout = InstallLayout::new("/opt/claw", &cfg);
        assert_eq!(layout.env_dir, PathBuf::from("/opt/claw/venv"));
        assert_eq!(layout.manifest_path, PathBuf::from("/opt/claw/requirements.txt"));
        assert_eq!(layout.wrapper_path, PathBuf::from("/opt/claw/ironclaw"));
        assert_eq!(
            layout.config_artifact_path,
            PathBuf::from("/opt/claw/data/config.json")
        );
        assert_eq!(layout.link_path, PathBuf::from("/usr/local/bin/ironclaw"));
        assert_eq!(
            layout.unit_path,
            PathBuf::from("/etc/systemd/system/ironclaw.service")
        );
    }
}
